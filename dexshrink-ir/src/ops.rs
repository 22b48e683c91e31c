use dexshrink_core::DexType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 11] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::And,
        BinaryOp::Or,
        BinaryOp::Xor,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::Ushr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::Shr => "shr",
            BinaryOp::Ushr => "ushr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Integer division and remainder throw `ArithmeticException` on a zero divisor.
    pub fn can_throw(self, ty: DexType) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Rem) && !matches!(ty.descriptor(), "F" | "D")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "neg" => Some(UnaryOp::Neg),
            "not" => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IfKind {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

impl IfKind {
    pub fn name(self) -> &'static str {
        match self {
            IfKind::Eq => "eq",
            IfKind::Ne => "ne",
            IfKind::Lt => "lt",
            IfKind::Ge => "ge",
            IfKind::Gt => "gt",
            IfKind::Le => "le",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "eq" => Some(IfKind::Eq),
            "ne" => Some(IfKind::Ne),
            "lt" => Some(IfKind::Lt),
            "ge" => Some(IfKind::Ge),
            "gt" => Some(IfKind::Gt),
            "le" => Some(IfKind::Le),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Direct,
    Virtual,
    Interface,
    Super,
}

impl InvokeKind {
    pub fn name(self) -> &'static str {
        match self {
            InvokeKind::Static => "invoke-static",
            InvokeKind::Direct => "invoke-direct",
            InvokeKind::Virtual => "invoke-virtual",
            InvokeKind::Interface => "invoke-interface",
            InvokeKind::Super => "invoke-super",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "invoke-static" => Some(InvokeKind::Static),
            "invoke-direct" => Some(InvokeKind::Direct),
            "invoke-virtual" => Some(InvokeKind::Virtual),
            "invoke-interface" => Some(InvokeKind::Interface),
            "invoke-super" => Some(InvokeKind::Super),
            _ => None,
        }
    }

    /// Dispatch depends on the runtime receiver type.
    pub fn is_dynamic(self) -> bool {
        matches!(self, InvokeKind::Virtual | InvokeKind::Interface | InvokeKind::Super)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_op_names_roundtrip() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_name(op.name()), Some(op));
        }
        assert_eq!(BinaryOp::from_name("pow"), None);
    }

    #[test]
    fn test_division_throws_only_for_integers() {
        assert!(BinaryOp::Div.can_throw(DexType::INT));
        assert!(BinaryOp::Rem.can_throw(DexType::LONG));
        assert!(!BinaryOp::Div.can_throw(DexType::DOUBLE));
        assert!(!BinaryOp::Add.can_throw(DexType::INT));
    }

    #[test]
    fn test_invoke_kinds() {
        assert_eq!(InvokeKind::from_name("invoke-direct"), Some(InvokeKind::Direct));
        assert!(InvokeKind::Virtual.is_dynamic());
        assert!(!InvokeKind::Static.is_dynamic());
    }
}
