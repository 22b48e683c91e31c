use crate::item_factory::intern;
use std::fmt;

/// A JVM type descriptor such as `I`, `[J` or `Ljava/lang/Object;`.
///
/// Descriptors are interned, so a `DexType` is `Copy` and comparisons are
/// plain string comparisons on shared storage.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct DexType(&'static str);

impl DexType {
    pub const VOID: DexType = DexType("V");
    pub const BOOLEAN: DexType = DexType("Z");
    pub const BYTE: DexType = DexType("B");
    pub const CHAR: DexType = DexType("C");
    pub const SHORT: DexType = DexType("S");
    pub const INT: DexType = DexType("I");
    pub const LONG: DexType = DexType("J");
    pub const FLOAT: DexType = DexType("F");
    pub const DOUBLE: DexType = DexType("D");

    pub const OBJECT: DexType = DexType("Ljava/lang/Object;");
    pub const STRING: DexType = DexType("Ljava/lang/String;");
    pub const CLASS: DexType = DexType("Ljava/lang/Class;");
    pub const THROWABLE: DexType = DexType("Ljava/lang/Throwable;");

    /// Interns `descriptor` without validating it.
    pub fn new(descriptor: &str) -> Self {
        DexType(intern(descriptor))
    }

    /// Parses a single, complete type descriptor.
    pub fn parse(descriptor: &str) -> Option<Self> {
        match scan_type(descriptor.as_bytes(), 0) {
            Some(end) if end == descriptor.len() => Some(Self::new(descriptor)),
            _ => None,
        }
    }

    pub fn descriptor(self) -> &'static str {
        self.0
    }

    pub fn is_void(self) -> bool {
        self.0 == "V"
    }

    pub fn is_primitive(self) -> bool {
        matches!(self.0, "Z" | "B" | "C" | "S" | "I" | "J" | "F" | "D")
    }

    pub fn is_reference(self) -> bool {
        self.is_class() || self.is_array()
    }

    pub fn is_class(self) -> bool {
        self.0.starts_with('L')
    }

    pub fn is_array(self) -> bool {
        self.0.starts_with('[')
    }

    pub fn is_wide(self) -> bool {
        matches!(self.0, "J" | "D")
    }

    pub fn array_element_type(self) -> Option<DexType> {
        self.0.strip_prefix('[').map(DexType::new)
    }

    /// Byte width of a primitive value of this type, as used by array payloads.
    pub fn primitive_width(self) -> Option<u32> {
        match self.0 {
            "Z" | "B" => Some(1),
            "C" | "S" => Some(2),
            "I" | "F" => Some(4),
            "J" | "D" => Some(8),
            _ => None,
        }
    }

    /// `Ljava/lang/Object;` => `java.lang.Object`, `[I` => `int[]`.
    pub fn to_source_string(self) -> String {
        if let Some(element) = self.array_element_type() {
            return format!("{}[]", element.to_source_string());
        }
        match self.0 {
            "V" => "void".to_string(),
            "Z" => "boolean".to_string(),
            "B" => "byte".to_string(),
            "C" => "char".to_string(),
            "S" => "short".to_string(),
            "I" => "int".to_string(),
            "J" => "long".to_string(),
            "F" => "float".to_string(),
            "D" => "double".to_string(),
            other => other
                .trim_start_matches('L')
                .trim_end_matches(';')
                .replace('/', "."),
        }
    }
}

impl fmt::Debug for DexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for DexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Returns the end offset of the type descriptor starting at `start`.
fn scan_type(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while bytes.get(i) == Some(&b'[') {
        i += 1;
    }
    match *bytes.get(i)? {
        b'Z' | b'B' | b'C' | b'S' | b'I' | b'J' | b'F' | b'D' => Some(i + 1),
        // `[V` is not a type.
        b'V' if i == start => Some(i + 1),
        b'L' => {
            let semi = bytes[i..].iter().position(|&b| b == b';')? + i;
            if semi == i + 1 {
                return None;
            }
            Some(semi + 1)
        }
        _ => None,
    }
}

/// A method prototype descriptor, e.g. `(I[Ljava/lang/String;)V`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DexProto(pub(crate) &'static str);

impl DexProto {
    pub fn parse(descriptor: &str) -> Option<Self> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return None;
        }
        let mut i = 1;
        while *bytes.get(i)? != b')' {
            if bytes[i] == b'V' {
                return None;
            }
            i = scan_type(bytes, i)?;
        }
        let end = scan_type(bytes, i + 1)?;
        if end != bytes.len() {
            return None;
        }
        Some(DexProto(intern(descriptor)))
    }

    pub fn descriptor(self) -> &'static str {
        self.0
    }

    pub fn parameters(self) -> Vec<DexType> {
        let bytes = self.0.as_bytes();
        let mut parameters = Vec::new();
        let mut i = 1;
        while bytes[i] != b')' {
            // Validated in `parse`.
            let end = scan_type(bytes, i).unwrap_or(bytes.len());
            parameters.push(DexType::new(&self.0[i..end]));
            i = end;
        }
        parameters
    }

    pub fn return_type(self) -> DexType {
        let close = self.0.find(')').unwrap_or(0);
        DexType::new(&self.0[close + 1..])
    }
}

impl fmt::Debug for DexProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Display for DexProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Symbolic reference to a field: `LFoo;->name:I`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub holder: DexType,
    pub name: &'static str,
    pub ty: DexType,
}

impl FieldRef {
    pub fn new(holder: DexType, name: &str, ty: DexType) -> Self {
        Self {
            holder,
            name: intern(name),
            ty,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (holder, rest) = text.split_once("->")?;
        let (name, ty) = rest.split_once(':')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(DexType::parse(holder)?, name, DexType::parse(ty)?))
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.holder, self.name, self.ty)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Symbolic reference to a method: `LFoo;->name(I)V`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    pub holder: DexType,
    pub name: &'static str,
    pub proto: DexProto,
}

impl MethodRef {
    pub fn new(holder: DexType, name: &str, proto: DexProto) -> Self {
        Self {
            holder,
            name: intern(name),
            proto,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (holder, rest) = text.split_once("->")?;
        let open = rest.find('(')?;
        let (name, proto) = rest.split_at(open);
        if name.is_empty() {
            return None;
        }
        Some(Self::new(DexType::parse(holder)?, name, DexProto::parse(proto)?))
    }

    /// Same name and prototype, ignoring the holder.
    pub fn matches_signature(&self, other: &MethodRef) -> bool {
        self.name == other.name && self.proto == other.proto
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}{}", self.holder, self.name, self.proto)
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
