//! A line-based textual form of whole programs.
//!
//! ```text
//! class LFoo; extends LBar; {
//!   static field x I
//!   method static <clinit>()V {
//!   block0:
//!     v0 = const 5
//!     sput LFoo;->x:I v0
//!     return
//!   }
//! }
//! ```
//!
//! Phi inputs are listed in predecessor order, and predecessors are ordered
//! by block number. See `print` for the reverse direction.

use crate::builder::IrBuilder;
use crate::code::IrCode;
use crate::error::IrError;
use crate::instruction::{BlockId, InstructionKind};
use crate::ops::{BinaryOp, IfKind, InvokeKind, UnaryOp};
use crate::optimization_info::{MethodOptimizationInfo, OptimizationFlags};
use crate::program::{AccessFlags, AppView, ClassDef, ClassOrigin, FieldDef, MethodDef};
use crate::value::ValueId;
use dexshrink_core::{DexProto, DexType, FieldRef, Literal, MethodRef};
use dexshrink_support::FastHashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: missing closing `}}`")]
    UnexpectedEof { line: usize },

    #[error("line {line}: {ty} is defined twice")]
    DuplicateDefinition { line: usize, ty: String },

    #[error("line {line}: {source}")]
    InvalidCode {
        line: usize,
        #[source]
        source: IrError,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. }
            | ParseError::UnexpectedEof { line }
            | ParseError::DuplicateDefinition { line, .. }
            | ParseError::InvalidCode { line, .. } => *line,
        }
    }
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

impl AppView {
    pub fn read_text(source: &str) -> Result<AppView, ParseError> {
        parse_program(source)
    }
}

pub fn parse_program(source: &str) -> Result<AppView, ParseError> {
    let mut parser = Parser::new(source);
    let mut app = AppView::new();
    while let Some((line, text)) = parser.next_line() {
        let class = parser.parse_class(line, text)?;
        if app.definition_for(class.ty).is_some() {
            return Err(ParseError::DuplicateDefinition {
                line,
                ty: class.ty.to_string(),
            });
        }
        app.add_class(class);
    }
    Ok(app)
}

/// Cuts a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if in_string && !escaped => {
                escaped = true;
                continue;
            }
            '"' if !escaped => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
        escaped = false;
    }
    line
}

struct Parser<'s> {
    lines: Vec<(usize, &'s str)>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, strip_comment(line).trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        Self { lines, pos: 0 }
    }

    fn next_line(&mut self) -> Option<(usize, &'s str)> {
        let line = self.lines.get(self.pos).copied()?;
        self.pos += 1;
        Some(line)
    }

    fn parse_class(&mut self, line: usize, text: &str) -> Result<ClassDef, ParseError> {
        let mut tokens = text.split_whitespace();
        let mut origin = ClassOrigin::Program;
        let mut flags = AccessFlags::PUBLIC;
        loop {
            match tokens.next() {
                Some("library") => origin = ClassOrigin::Library,
                Some("interface") => flags |= AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
                Some("abstract") => flags |= AccessFlags::ABSTRACT,
                Some("final") => flags |= AccessFlags::FINAL,
                Some("class") => break,
                Some(other) => return Err(syntax(line, format!("unexpected `{other}`"))),
                None => return Err(syntax(line, "expected `class`")),
            }
        }
        let ty = parse_class_type(line, tokens.next())?;
        let mut class = ClassDef::new(ty);
        class.origin = origin;
        class.flags = flags;

        let mut implementing = false;
        let mut opened = false;
        while let Some(token) = tokens.next() {
            match token {
                "{" => {
                    opened = true;
                    if let Some(extra) = tokens.next() {
                        return Err(syntax(line, format!("unexpected `{extra}` after `{{`")));
                    }
                }
                "extends" if !implementing => {
                    class.super_type = Some(parse_class_type(line, tokens.next())?);
                }
                "implements" => implementing = true,
                other if implementing => class.interfaces.push(parse_class_type(line, Some(other))?),
                other => return Err(syntax(line, format!("unexpected `{other}`"))),
            }
        }
        if !opened {
            return Err(syntax(line, "expected `{`"));
        }

        loop {
            let Some((member_line, member)) = self.next_line() else {
                return Err(ParseError::UnexpectedEof { line });
            };
            if member == "}" {
                break;
            }
            self.parse_member(&mut class, member_line, member)?;
        }
        Ok(class)
    }

    fn parse_member(
        &mut self,
        class: &mut ClassDef,
        line: usize,
        text: &str,
    ) -> Result<(), ParseError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some(keyword) = tokens
            .iter()
            .position(|&token| token == "field" || token == "method")
        else {
            return Err(syntax(line, "expected `field` or `method`"));
        };
        let mut flags = AccessFlags::empty();
        for &token in &tokens[..keyword] {
            flags |= modifier(token)
                .ok_or_else(|| syntax(line, format!("unknown modifier `{token}`")))?;
        }
        let mut rest = &tokens[keyword + 1..];
        // Methods also take their modifiers after the keyword.
        if tokens[keyword] == "method" {
            while let Some((flag, tail)) = rest
                .split_first()
                .and_then(|(&token, tail)| Some((modifier(token)?, tail)))
            {
                flags |= flag;
                rest = tail;
            }
        }

        if tokens[keyword] == "field" {
            let [name, ty] = rest else {
                return Err(syntax(line, "expected `field <name> <type>`"));
            };
            let ty = parse_type(line, ty)?;
            if ty.is_void() {
                return Err(syntax(line, "fields cannot have type V"));
            }
            let reference = FieldRef::new(class.ty, name, ty);
            if class.lookup_field(&reference).is_some() {
                return Err(ParseError::DuplicateDefinition {
                    line,
                    ty: reference.to_string(),
                });
            }
            class.fields.push(FieldDef { reference, flags });
            return Ok(());
        }

        let Some((&signature, rest)) = rest.split_first() else {
            return Err(syntax(line, "expected a method signature"));
        };
        let reference = parse_signature(line, class.ty, signature)?;
        if class.lookup_method(&reference).is_some() {
            return Err(ParseError::DuplicateDefinition {
                line,
                ty: reference.to_string(),
            });
        }
        let (rest, has_body) = match rest.split_last() {
            Some((&"{", rest)) => (rest, true),
            _ => (rest, false),
        };
        let mut optimization_flags = OptimizationFlags::empty();
        for flag in rest
            .iter()
            .flat_map(|token| token.split(','))
            .filter(|flag| !flag.is_empty())
        {
            optimization_flags |= parse_optimization_flag(line, flag)?;
        }

        let mut method = MethodDef::new(reference, flags);
        method.optimization_info = MethodOptimizationInfo::new(optimization_flags);
        if has_body {
            method.code = Some(self.parse_body(reference, method.is_static(), line)?);
        }
        class.methods.push(method);
        Ok(())
    }

    fn parse_body(
        &mut self,
        method: MethodRef,
        is_static: bool,
        header: usize,
    ) -> Result<IrCode, ParseError> {
        let mut body = BodyParser::new(method, is_static);
        loop {
            let Some((line, text)) = self.next_line() else {
                return Err(ParseError::UnexpectedEof { line: header });
            };
            if text == "}" {
                break;
            }
            body.parse_line(line, text)?;
        }
        body.finish(header)
    }
}

fn modifier(token: &str) -> Option<AccessFlags> {
    Some(match token {
        "public" => AccessFlags::PUBLIC,
        "private" => AccessFlags::PRIVATE,
        "static" => AccessFlags::STATIC,
        "final" => AccessFlags::FINAL,
        "native" => AccessFlags::NATIVE,
        "synchronized" => AccessFlags::SYNCHRONIZED,
        "abstract" => AccessFlags::ABSTRACT,
        _ => return None,
    })
}

fn parse_type(line: usize, token: &str) -> Result<DexType, ParseError> {
    DexType::parse(token).ok_or_else(|| syntax(line, format!("invalid type `{token}`")))
}

fn parse_class_type(line: usize, token: Option<&str>) -> Result<DexType, ParseError> {
    let token = token.ok_or_else(|| syntax(line, "expected a class type"))?;
    let ty = parse_type(line, token)?;
    if !ty.is_class() {
        return Err(syntax(line, format!("`{token}` is not a class type")));
    }
    Ok(ty)
}

/// `name(Args)Ret`, declared on `holder`.
fn parse_signature(line: usize, holder: DexType, token: &str) -> Result<MethodRef, ParseError> {
    let invalid = || syntax(line, format!("invalid method signature `{token}`"));
    let open = token.find('(').ok_or_else(invalid)?;
    let (name, proto) = token.split_at(open);
    if name.is_empty() {
        return Err(invalid());
    }
    let proto = DexProto::parse(proto).ok_or_else(invalid)?;
    Ok(MethodRef::new(holder, name, proto))
}

fn parse_optimization_flag(line: usize, flag: &str) -> Result<OptimizationFlags, ParseError> {
    match flag {
        "no-side-effects" => Ok(OptimizationFlags::NO_SIDE_EFFECTS),
        "pure-constructor" => Ok(OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES),
        "environment-independent-fields" => {
            Ok(OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT)
        }
        "postponable-clinit" => Ok(OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED),
        other => Err(syntax(line, format!("unknown method flag `{other}`"))),
    }
}

pub(crate) fn optimization_flag_names(flags: OptimizationFlags) -> Vec<&'static str> {
    let mut names = Vec::new();
    if flags.contains(OptimizationFlags::NO_SIDE_EFFECTS) {
        names.push("no-side-effects");
    }
    if flags.contains(OptimizationFlags::NO_SIDE_EFFECTS_BESIDES_RECEIVER_FIELD_WRITES) {
        names.push("pure-constructor");
    }
    if flags.contains(OptimizationFlags::INSTANCE_FIELD_INITIALIZATION_INDEPENDENT_OF_ENVIRONMENT) {
        names.push("environment-independent-fields");
    }
    if flags.contains(OptimizationFlags::CLASS_INITIALIZER_MAY_BE_POSTPONED) {
        names.push("postponable-clinit");
    }
    names
}

/// The arithmetic type selected by an opcode suffix such as `add-long`.
fn arithmetic_type(suffix: Option<&str>) -> Option<DexType> {
    match suffix {
        None => Some(DexType::INT),
        Some("long") => Some(DexType::LONG),
        Some("float") => Some(DexType::FLOAT),
        Some("double") => Some(DexType::DOUBLE),
        Some(_) => None,
    }
}

/// Parses a double-quoted string with `\"`, `\\`, `\n` and `\t` escapes.
fn parse_string_literal(line: usize, text: &str) -> Result<String, ParseError> {
    let inner = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| syntax(line, "expected a quoted string"))?;
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(c @ ('"' | '\\')) => result.push(c),
            _ => return Err(syntax(line, "invalid escape in string")),
        }
    }
    Ok(result)
}

struct BodyParser {
    builder: IrBuilder,
    values: FastHashMap<String, ValueId>,
    blocks: FastHashMap<String, BlockId>,
    /// Per block: the line of its label, once seen.
    labels: Vec<Option<usize>>,
    /// Per block: the line that first mentioned it.
    first_mention: Vec<usize>,
    current: Option<BlockId>,
}

impl BodyParser {
    fn new(method: MethodRef, is_static: bool) -> Self {
        Self {
            builder: IrBuilder::new(method, is_static),
            values: FastHashMap::default(),
            blocks: FastHashMap::default(),
            labels: Vec::new(),
            first_mention: Vec::new(),
            current: None,
        }
    }

    fn value(&mut self, line: usize, token: &str) -> Result<ValueId, ParseError> {
        let valid = token
            .strip_prefix('v')
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        if !valid {
            return Err(syntax(line, format!("expected a value, found `{token}`")));
        }
        if let Some(&value) = self.values.get(token) {
            return Ok(value);
        }
        let value = self.builder.reserve_value();
        self.values.insert(token.to_string(), value);
        Ok(value)
    }

    fn values<'t>(
        &mut self,
        line: usize,
        tokens: impl IntoIterator<Item = &'t str>,
    ) -> Result<Vec<ValueId>, ParseError> {
        tokens
            .into_iter()
            .map(|token| self.value(line, token))
            .collect()
    }

    fn block(&mut self, line: usize, token: &str) -> Result<BlockId, ParseError> {
        let valid = token
            .strip_prefix("block")
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
        if !valid {
            return Err(syntax(line, format!("expected a block, found `{token}`")));
        }
        if let Some(&block) = self.blocks.get(token) {
            return Ok(block);
        }
        let block = self.builder.add_block();
        self.blocks.insert(token.to_string(), block);
        self.labels.push(None);
        self.first_mention.push(line);
        Ok(block)
    }

    fn parse_line(&mut self, line: usize, text: &str) -> Result<(), ParseError> {
        if let Some(label) = text.strip_suffix(':') {
            let block = self.block(line, label)?;
            if self.labels[block.index()].is_some() {
                return Err(syntax(line, format!("block `{label}` is defined twice")));
            }
            self.labels[block.index()] = Some(line);
            self.current = Some(block);
            return Ok(());
        }
        let current = self
            .current
            .ok_or_else(|| syntax(line, "instruction outside of a block"))?;

        let (out, rhs) = match text.split_once('=') {
            Some((lhs, rhs)) if !text.starts_with("const-string") && !lhs.contains('"') => {
                (Some(self.value(line, lhs.trim())?), rhs.trim())
            }
            _ => (None, text),
        };
        let (op, operands) = rhs.split_once(char::is_whitespace).unwrap_or((rhs, ""));
        let operands = operands.trim();
        let args: Vec<&str> = operands.split_whitespace().collect();

        if op == "catch" {
            let [guard, target] = args[..] else {
                return Err(syntax(line, "expected `catch <type> <block>`"));
            };
            if out.is_some() {
                return Err(syntax(line, "`catch` does not define a value"));
            }
            let guard = parse_class_type(line, Some(guard))?;
            let target = self.block(line, target)?;
            self.builder.add_catch_handler(current, guard, target);
            return Ok(());
        }

        if op == "phi" {
            let out = out.ok_or_else(|| syntax(line, "`phi` must define a value"))?;
            let inputs = self.values(line, args)?;
            return self
                .builder
                .define_phi(out, current, inputs)
                .map_err(|e| syntax(line, e.to_string()));
        }

        let kind = self.parse_instruction(line, op, operands, &args)?;
        let defines_value = !matches!(
            kind,
            InstructionKind::ArrayPut { .. }
                | InstructionKind::StaticPut { .. }
                | InstructionKind::InstancePut { .. }
                | InstructionKind::If { .. }
                | InstructionKind::Switch { .. }
                | InstructionKind::Goto { .. }
                | InstructionKind::Return { .. }
                | InstructionKind::Throw { .. }
                | InstructionKind::Invoke { .. }
        );
        match out {
            Some(out) => {
                if !defines_value && !matches!(kind, InstructionKind::Invoke { .. }) {
                    return Err(syntax(line, format!("`{op}` does not define a value")));
                }
                self.builder
                    .append_with_out(current, kind, out)
                    .map_err(|e| syntax(line, e.to_string()))?;
            }
            None => {
                if defines_value {
                    return Err(syntax(line, format!("`{op}` must define a value")));
                }
                self.builder.append(current, kind);
            }
        }
        Ok(())
    }

    fn parse_instruction(
        &mut self,
        line: usize,
        op: &str,
        operands: &str,
        args: &[&str],
    ) -> Result<InstructionKind, ParseError> {
        let arity = |expected: usize| -> Result<(), ParseError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(syntax(
                    line,
                    format!("`{op}` expects {expected} operands, found {}", args.len()),
                ))
            }
        };
        let number = |token: &str| -> Result<i64, ParseError> {
            token
                .parse::<i64>()
                .map_err(|_| syntax(line, format!("invalid number `{token}`")))
        };

        let kind = match op {
            "arg" => {
                arity(1)?;
                let index = u32::try_from(number(args[0])?)
                    .map_err(|_| syntax(line, "invalid argument index"))?;
                InstructionKind::Argument { index }
            }
            "const" => {
                arity(1)?;
                let value = i32::try_from(number(args[0])?)
                    .map_err(|_| syntax(line, "constant does not fit in 32 bits"))?;
                InstructionKind::ConstNumber(Literal::Int(value))
            }
            "const-wide" => {
                arity(1)?;
                InstructionKind::ConstNumber(Literal::Long(number(args[0])?))
            }
            "const-float" => {
                arity(1)?;
                let value = args[0]
                    .parse::<f32>()
                    .map_err(|_| syntax(line, format!("invalid float `{}`", args[0])))?;
                InstructionKind::ConstNumber(Literal::Float(value))
            }
            "const-double" => {
                arity(1)?;
                let value = args[0]
                    .parse::<f64>()
                    .map_err(|_| syntax(line, format!("invalid double `{}`", args[0])))?;
                InstructionKind::ConstNumber(Literal::Double(value))
            }
            "const-null" => {
                arity(0)?;
                InstructionKind::ConstNumber(Literal::Null)
            }
            "const-string" => InstructionKind::ConstString(parse_string_literal(line, operands)?),
            "const-class" => {
                arity(1)?;
                InstructionKind::ConstClass(parse_type(line, args[0])?)
            }
            "move" | "assume" => {
                arity(1)?;
                let src = self.value(line, args[0])?;
                if op == "move" {
                    InstructionKind::Move { src }
                } else {
                    InstructionKind::Assume { src }
                }
            }
            "check-cast" => {
                arity(2)?;
                InstructionKind::CheckCast {
                    src: self.value(line, args[0])?,
                    ty: parse_type(line, args[1])?,
                }
            }
            "cmp" => {
                arity(2)?;
                InstructionKind::Cmp {
                    left: self.value(line, args[0])?,
                    right: self.value(line, args[1])?,
                }
            }
            "new-array" => {
                arity(2)?;
                InstructionKind::NewArrayEmpty {
                    ty: parse_array_type(line, args[0])?,
                    size: self.value(line, args[1])?,
                }
            }
            "filled-new-array" => {
                let (&ty, elements) = args
                    .split_first()
                    .ok_or_else(|| syntax(line, "expected an array type"))?;
                InstructionKind::NewArrayFilled {
                    ty: parse_array_type(line, ty)?,
                    elements: self.values(line, elements.iter().copied())?,
                }
            }
            "new-array-data" => {
                let [ty, width, data @ ..] = args else {
                    return Err(syntax(line, "expected `new-array-data <type> <width> <data>...`"));
                };
                let element_width = u32::try_from(number(*width)?)
                    .map_err(|_| syntax(line, "invalid element width"))?;
                InstructionKind::NewArrayFilledData {
                    ty: parse_array_type(line, ty)?,
                    element_width,
                    data: data.iter().map(|token| number(*token)).collect::<Result<_, _>>()?,
                }
            }
            "aget" => {
                arity(2)?;
                InstructionKind::ArrayGet {
                    array: self.value(line, args[0])?,
                    index: self.value(line, args[1])?,
                }
            }
            "aput" => {
                arity(3)?;
                InstructionKind::ArrayPut {
                    array: self.value(line, args[0])?,
                    index: self.value(line, args[1])?,
                    value: self.value(line, args[2])?,
                }
            }
            "array-length" => {
                arity(1)?;
                InstructionKind::ArrayLength {
                    array: self.value(line, args[0])?,
                }
            }
            "sget" => {
                arity(1)?;
                InstructionKind::StaticGet {
                    field: parse_field(line, args[0])?,
                }
            }
            "sput" => {
                arity(2)?;
                InstructionKind::StaticPut {
                    field: parse_field(line, args[0])?,
                    value: self.value(line, args[1])?,
                }
            }
            "iget" => {
                arity(2)?;
                InstructionKind::InstanceGet {
                    object: self.value(line, args[0])?,
                    field: parse_field(line, args[1])?,
                }
            }
            "iput" => {
                arity(3)?;
                InstructionKind::InstancePut {
                    object: self.value(line, args[0])?,
                    field: parse_field(line, args[1])?,
                    value: self.value(line, args[2])?,
                }
            }
            "new-instance" => {
                arity(1)?;
                InstructionKind::NewInstance {
                    ty: parse_class_type(line, Some(args[0]))?,
                }
            }
            "switch" => self.parse_switch(line, args)?,
            "goto" => {
                arity(1)?;
                InstructionKind::Goto {
                    target: self.block(line, args[0])?,
                }
            }
            "return" => match args {
                [] => InstructionKind::Return { value: None },
                [value] => InstructionKind::Return {
                    value: Some(self.value(line, value)?),
                },
                _ => return Err(syntax(line, "`return` takes at most one operand")),
            },
            "throw" => {
                arity(1)?;
                InstructionKind::Throw {
                    exception: self.value(line, args[0])?,
                }
            }
            _ => {
                if let Some(kind) = InvokeKind::from_name(op) {
                    let (&method, arguments) = args
                        .split_first()
                        .ok_or_else(|| syntax(line, "expected a method reference"))?;
                    let method = MethodRef::parse(method)
                        .ok_or_else(|| syntax(line, format!("invalid method `{method}`")))?;
                    let arguments = self.values(line, arguments.iter().copied())?;
                    return Ok(InstructionKind::Invoke {
                        kind,
                        method,
                        arguments,
                    });
                }
                if let Some(condition) = op.strip_prefix("if-") {
                    return self.parse_if(line, condition, args);
                }
                return self.parse_arithmetic(line, op, args);
            }
        };
        Ok(kind)
    }

    fn parse_if(
        &mut self,
        line: usize,
        condition: &str,
        args: &[&str],
    ) -> Result<InstructionKind, ParseError> {
        let (kind, compares_zero) = match IfKind::from_name(condition) {
            Some(kind) => (kind, false),
            None => match condition.strip_suffix('z').and_then(IfKind::from_name) {
                Some(kind) => (kind, true),
                None => return Err(syntax(line, format!("unknown instruction `if-{condition}`"))),
            },
        };
        let (left, right, targets) = match (compares_zero, args) {
            (true, [left, t, f]) => (self.value(line, left)?, None, [*t, *f]),
            (false, [left, right, t, f]) => (
                self.value(line, left)?,
                Some(self.value(line, right)?),
                [*t, *f],
            ),
            _ => return Err(syntax(line, format!("wrong operands for `if-{condition}`"))),
        };
        Ok(InstructionKind::If {
            kind,
            left,
            right,
            true_target: self.block(line, targets[0])?,
            false_target: self.block(line, targets[1])?,
        })
    }

    fn parse_switch(&mut self, line: usize, args: &[&str]) -> Result<InstructionKind, ParseError> {
        let (&value, cases) = args
            .split_first()
            .ok_or_else(|| syntax(line, "expected a switch value"))?;
        let value = self.value(line, value)?;
        let mut keys = Vec::new();
        let mut targets = Vec::new();
        let mut fallthrough = None;
        for case in cases {
            let (key, target) = case
                .split_once(':')
                .ok_or_else(|| syntax(line, format!("invalid switch case `{case}`")))?;
            let target = self.block(line, target)?;
            if key == "default" {
                if fallthrough.replace(target).is_some() {
                    return Err(syntax(line, "duplicate `default` case"));
                }
                continue;
            }
            let key = key
                .parse::<i32>()
                .map_err(|_| syntax(line, format!("invalid switch key `{key}`")))?;
            if keys.contains(&key) {
                return Err(syntax(line, format!("duplicate switch key {key}")));
            }
            keys.push(key);
            targets.push(target);
        }
        let fallthrough = fallthrough.ok_or_else(|| syntax(line, "missing `default` case"))?;
        Ok(InstructionKind::Switch {
            value,
            keys,
            targets,
            fallthrough,
        })
    }

    fn parse_arithmetic(
        &mut self,
        line: usize,
        op: &str,
        args: &[&str],
    ) -> Result<InstructionKind, ParseError> {
        let unknown = || syntax(line, format!("unknown instruction `{op}`"));
        let (name, suffix) = match op.split_once('-') {
            Some((name, suffix)) => (name, Some(suffix)),
            None => (op, None),
        };
        let ty = arithmetic_type(suffix).ok_or_else(unknown)?;
        if let Some(op) = BinaryOp::from_name(name) {
            let [left, right] = args else {
                return Err(syntax(line, format!("`{name}` expects 2 operands")));
            };
            return Ok(InstructionKind::Binop {
                op,
                ty,
                left: self.value(line, left)?,
                right: self.value(line, right)?,
            });
        }
        if let Some(op) = UnaryOp::from_name(name) {
            let [operand] = args else {
                return Err(syntax(line, format!("`{name}` expects 1 operand")));
            };
            return Ok(InstructionKind::Unop {
                op,
                ty,
                operand: self.value(line, operand)?,
            });
        }
        Err(unknown())
    }

    fn finish(self, header: usize) -> Result<IrCode, ParseError> {
        if self.labels.is_empty() {
            return Err(syntax(header, "method body has no blocks"));
        }
        if let Some(block) = self.labels.iter().position(Option::is_none) {
            return Err(syntax(
                self.first_mention[block],
                format!("block{} is never defined", block_label(&self.blocks, block)),
            ));
        }
        self.builder
            .finish()
            .map_err(|source| ParseError::InvalidCode {
                line: header,
                source,
            })
    }
}

/// The numeric suffix a block was written with, for diagnostics.
fn block_label(blocks: &FastHashMap<String, BlockId>, index: usize) -> String {
    blocks
        .iter()
        .find(|(_, id)| id.index() == index)
        .and_then(|(name, _)| name.strip_prefix("block"))
        .unwrap_or("?")
        .to_string()
}

fn parse_array_type(line: usize, token: &str) -> Result<DexType, ParseError> {
    let ty = parse_type(line, token)?;
    if !ty.is_array() {
        return Err(syntax(line, format!("`{token}` is not an array type")));
    }
    Ok(ty)
}

fn parse_field(line: usize, token: &str) -> Result<FieldRef, ParseError> {
    FieldRef::parse(token).ok_or_else(|| syntax(line, format!("invalid field `{token}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program() {
        let app = AppView::read_text(
            "# a comment
             library class Ljava/lang/Object; {
               method <init>()V no-side-effects
             }
             interface class LI; {
             }
             class LA; extends LB; implements LI; {
               static final field x I   # trailing comment
               field name Ljava/lang/String;
               method static <clinit>()V {
               block0:
                 v0 = const-string \"a # b\"
                 v1 = const 5
                 sput LA;->x:I v1
                 return
               }
             }",
        )
        .unwrap();
        assert_eq!(app.num_classes(), 3);
        let object = app.definition_for(DexType::OBJECT).unwrap();
        assert!(object.is_library());
        assert_eq!(object.super_type, None);
        assert!(!object.methods[0].optimization_info.may_have_side_effects());

        let a = app.definition_for(DexType::new("LA;")).unwrap();
        assert_eq!(a.super_type, Some(DexType::new("LB;")));
        assert_eq!(a.interfaces, vec![DexType::new("LI;")]);
        assert_eq!(a.fields.len(), 2);
        assert!(a.fields[0].is_static());
        let code = a.methods[0].code.as_ref().unwrap();
        assert_eq!(code.num_instructions(), 4);
        assert_eq!(
            code.instruction(crate::instruction::InstrId(0)).kind,
            InstructionKind::ConstString("a # b".to_string())
        );
        assert!(app.definition_for(DexType::new("LI;")).unwrap().is_interface());
    }

    #[test]
    fn test_method_modifiers_after_keyword() {
        let app = AppView::read_text(
            "class LA; {
               method static <clinit>()V {
               block0:
                 return
               }
               method static native synchronized now()J
               private method final run()V no-side-effects
             }",
        )
        .unwrap();
        let a = app.definition_for(DexType::new("LA;")).unwrap();
        let clinit = a.class_initializer(app.factory()).unwrap();
        assert_eq!(clinit.flags, AccessFlags::STATIC);
        assert!(clinit.code.is_some());
        assert_eq!(
            a.methods[1].flags,
            AccessFlags::STATIC | AccessFlags::NATIVE | AccessFlags::SYNCHRONIZED
        );
        assert_eq!(a.methods[1].reference.name, "now");
        assert_eq!(a.methods[2].flags, AccessFlags::PRIVATE | AccessFlags::FINAL);
        assert!(!a.methods[2].optimization_info.may_have_side_effects());
    }

    #[test]
    fn test_parse_control_flow() {
        let app = AppView::read_text(
            "class LA; {
               method static f(I)I {
               block0:
                 v0 = arg 0
                 switch v0 1:block1 2:block2 default:block3
               block1:
                 v1 = const 10
                 goto block3
               block2:
                 v2 = mul-long v0 v0
                 if-nez v0 block3 block3
               block3:
                 v3 = phi v0 v1 v0 v0
                 return v3
               }
             }",
        )
        .unwrap();
        let method = MethodRef::parse("LA;->f(I)I").unwrap();
        let code = app.method_definition(&method).unwrap().code.as_ref().unwrap();
        assert_eq!(code.num_blocks(), 4);
        assert_eq!(code.block(BlockId(3)).predecessors.len(), 4);
        assert!(code.value(ValueId(3)).is_phi());
    }

    fn error(source: &str) -> ParseError {
        AppView::read_text(source).unwrap_err()
    }

    #[test]
    fn test_syntax_errors_carry_lines() {
        let err = error("class LA; {\n  method static <clinit>()V {\n  block0:\n    v0 = frobnicate v1\n  }\n}");
        assert_eq!(err.line(), 4);
        assert!(err.to_string().contains("frobnicate"));

        let err = error("class LA; {\n  static field x\n}");
        assert_eq!(err.line(), 2);

        let err = error("class LA; {\n  method static <clinit>()V {\n  block0:\n    goto block7\n  }\n}");
        assert_eq!(err.line(), 4);
        assert!(err.to_string().contains("block7"));

        let err = error("class LA; {\n");
        assert!(matches!(err, ParseError::UnexpectedEof { line: 1 }));

        let err = error("class I {\n}");
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_duplicate_definitions() {
        let err = error("class LA; {\n}\nclass LA; {\n}");
        assert!(matches!(err, ParseError::DuplicateDefinition { line: 3, .. }));

        let err = error("class LA; {\n  field x I\n  field x I\n}");
        assert!(matches!(err, ParseError::DuplicateDefinition { line: 3, .. }));
    }

    #[test]
    fn test_invalid_code_is_reported() {
        // v1 is used but never defined.
        let err = error(
            "class LA; {
               method static <clinit>()V {
               block0:
                 sput LA;->x:I v1
                 return
               }
             }",
        );
        assert!(matches!(err, ParseError::InvalidCode { line: 2, .. }));

        // Terminator in the middle of a block.
        let err = error(
            "class LA; {
               method static <clinit>()V {
               block0:
                 return
                 v0 = const 1
                 return
               }
             }",
        );
        assert!(matches!(err, ParseError::InvalidCode { .. }));
    }

    #[test]
    fn test_value_definition_rules() {
        let err = error("class LA; {\n method static m()V {\n block0:\n v0 = goto block0\n }\n}");
        assert!(err.to_string().contains("does not define a value"));

        let err = error("class LA; {\n method static m()V {\n block0:\n const 1\n return\n }\n}");
        assert!(err.to_string().contains("must define a value"));

        let err = error("class LA; {\n method static m()V {\n block0:\n v0 = const 1\n v0 = const 2\n return\n }\n}");
        assert_eq!(err.line(), 5);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(parse_string_literal(1, r#""a\"b\\c\n""#).unwrap(), "a\"b\\c\n");
        assert!(parse_string_literal(1, "\"unterminated").is_err());
        assert!(parse_string_literal(1, "\"").is_err());
        assert!(parse_string_literal(1, r#""bad\q""#).is_err());
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("a # b"), "a ");
        assert_eq!(
            strip_comment(r##"v0 = const-string "\"#" # c"##),
            r##"v0 = const-string "\"#" "##
        );
    }
}
