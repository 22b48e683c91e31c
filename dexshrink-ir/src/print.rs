//! Prints programs in the textual form read by `text`.

use crate::code::IrCode;
use crate::instruction::{Instruction, InstructionKind};
use crate::pass::Pass;
use crate::program::{AccessFlags, AppView, ClassDef, MethodDef};
use crate::text::optimization_flag_names;
use crate::value::ValueId;
use dexshrink_core::{DexType, Literal};
use std::fmt::{self, Write};

pub fn print_code(code: &IrCode) -> String {
    CodePrinter(code).to_string()
}

pub fn print_program(app: &AppView) -> String {
    ProgramPrinter(app).to_string()
}

/// Prints the program to stdout.
pub struct Print;

impl Pass for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn run(&mut self, app: &mut AppView) {
        print!("{}", ProgramPrinter(app));
    }
}

pub struct ProgramPrinter<'a>(pub &'a AppView);

impl fmt::Display for ProgramPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in self.0.classes() {
            write_class(f, class)?;
        }
        Ok(())
    }
}

pub struct CodePrinter<'a>(pub &'a IrCode);

impl fmt::Display for CodePrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_blocks(f, self.0, "")
    }
}

fn write_class(f: &mut fmt::Formatter<'_>, class: &ClassDef) -> fmt::Result {
    if class.is_library() {
        f.write_str("library ")?;
    }
    if class.is_interface() {
        f.write_str("interface ")?;
    } else if class.flags.contains(AccessFlags::ABSTRACT) {
        f.write_str("abstract ")?;
    }
    if class.flags.contains(AccessFlags::FINAL) {
        f.write_str("final ")?;
    }
    write!(f, "class {}", class.ty)?;
    if let Some(super_type) = class.super_type {
        if super_type != DexType::OBJECT {
            write!(f, " extends {}", super_type)?;
        }
    }
    if !class.interfaces.is_empty() {
        f.write_str(" implements")?;
        for interface in &class.interfaces {
            write!(f, " {}", interface)?;
        }
    }
    f.write_str(" {\n")?;
    for field in &class.fields {
        f.write_str("  ")?;
        write_modifiers(f, field.flags)?;
        writeln!(f, "field {} {}", field.reference.name, field.reference.ty)?;
    }
    for method in &class.methods {
        write_method(f, method)?;
    }
    f.write_str("}\n")
}

fn write_modifiers(f: &mut fmt::Formatter<'_>, flags: AccessFlags) -> fmt::Result {
    const MODIFIERS: [(AccessFlags, &str); 7] = [
        (AccessFlags::PUBLIC, "public"),
        (AccessFlags::PRIVATE, "private"),
        (AccessFlags::STATIC, "static"),
        (AccessFlags::FINAL, "final"),
        (AccessFlags::NATIVE, "native"),
        (AccessFlags::SYNCHRONIZED, "synchronized"),
        (AccessFlags::ABSTRACT, "abstract"),
    ];
    for (flag, name) in MODIFIERS {
        if flags.contains(flag) {
            write!(f, "{} ", name)?;
        }
    }
    Ok(())
}

fn write_method(f: &mut fmt::Formatter<'_>, method: &MethodDef) -> fmt::Result {
    f.write_str("  method ")?;
    write_modifiers(f, method.flags)?;
    write!(f, "{}{}", method.reference.name, method.reference.proto)?;
    let flags = optimization_flag_names(method.optimization_info.flags);
    if !flags.is_empty() {
        write!(f, " {}", flags.join(", "))?;
    }
    match &method.code {
        Some(code) => {
            f.write_str(" {\n")?;
            write_blocks(f, code, "  ")?;
            f.write_str("  }\n")
        }
        None => f.write_str("\n"),
    }
}

fn write_blocks(f: &mut fmt::Formatter<'_>, code: &IrCode, indent: &str) -> fmt::Result {
    for (id, block) in code.blocks() {
        writeln!(f, "{}{:?}:", indent, id)?;
        for handler in &block.catch_handlers {
            writeln!(f, "{}  catch {} {:?}", indent, handler.guard, handler.target)?;
        }
        for &phi in &block.phis {
            write!(f, "{}  {:?} = phi", indent, phi)?;
            for input in code.value(phi).phi_inputs().unwrap_or_default() {
                write!(f, " {:?}", input)?;
            }
            f.write_char('\n')?;
        }
        for &instruction in &block.instructions {
            f.write_str(indent)?;
            f.write_str("  ")?;
            write_instruction(f, code.instruction(instruction))?;
            f.write_char('\n')?;
        }
    }
    Ok(())
}

fn arithmetic_suffix(ty: DexType) -> &'static str {
    if ty == DexType::LONG {
        "-long"
    } else if ty == DexType::FLOAT {
        "-float"
    } else if ty == DexType::DOUBLE {
        "-double"
    } else {
        ""
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &[ValueId]) -> fmt::Result {
    for value in values {
        write!(f, " {:?}", value)?;
    }
    Ok(())
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in value.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

fn write_instruction(f: &mut fmt::Formatter<'_>, instruction: &Instruction) -> fmt::Result {
    if let Some(out) = instruction.out_value {
        write!(f, "{:?} = ", out)?;
    }
    use InstructionKind::*;
    match &instruction.kind {
        Argument { index } => write!(f, "arg {}", index),
        ConstNumber(Literal::Int(v)) => write!(f, "const {}", v),
        ConstNumber(Literal::Long(v)) => write!(f, "const-wide {}", v),
        ConstNumber(Literal::Float(v)) => write!(f, "const-float {}", v),
        ConstNumber(Literal::Double(v)) => write!(f, "const-double {}", v),
        ConstNumber(Literal::Null) => f.write_str("const-null"),
        ConstString(value) => {
            f.write_str("const-string ")?;
            write_string_literal(f, value)
        }
        ConstClass(ty) => write!(f, "const-class {}", ty),
        Move { src } => write!(f, "move {:?}", src),
        Assume { src } => write!(f, "assume {:?}", src),
        CheckCast { src, ty } => write!(f, "check-cast {:?} {}", src, ty),
        Binop {
            op,
            ty,
            left,
            right,
        } => write!(
            f,
            "{}{} {:?} {:?}",
            op.name(),
            arithmetic_suffix(*ty),
            left,
            right
        ),
        Unop { op, ty, operand } => {
            write!(f, "{}{} {:?}", op.name(), arithmetic_suffix(*ty), operand)
        }
        Cmp { left, right } => write!(f, "cmp {:?} {:?}", left, right),
        NewArrayEmpty { ty, size } => write!(f, "new-array {} {:?}", ty, size),
        NewArrayFilled { ty, elements } => {
            write!(f, "filled-new-array {}", ty)?;
            write_values(f, elements)
        }
        NewArrayFilledData {
            ty,
            element_width,
            data,
        } => {
            write!(f, "new-array-data {} {}", ty, element_width)?;
            for value in data {
                write!(f, " {}", value)?;
            }
            Ok(())
        }
        ArrayGet { array, index } => write!(f, "aget {:?} {:?}", array, index),
        ArrayPut {
            array,
            index,
            value,
        } => write!(f, "aput {:?} {:?} {:?}", array, index, value),
        ArrayLength { array } => write!(f, "array-length {:?}", array),
        StaticGet { field } => write!(f, "sget {}", field),
        StaticPut { field, value } => write!(f, "sput {} {:?}", field, value),
        InstanceGet { object, field } => write!(f, "iget {:?} {}", object, field),
        InstancePut {
            object,
            field,
            value,
        } => write!(f, "iput {:?} {} {:?}", object, field, value),
        NewInstance { ty } => write!(f, "new-instance {}", ty),
        Invoke {
            kind,
            method,
            arguments,
        } => {
            write!(f, "{} {}", kind.name(), method)?;
            write_values(f, arguments)
        }
        If {
            kind,
            left,
            right,
            true_target,
            false_target,
        } => match right {
            Some(right) => write!(
                f,
                "if-{} {:?} {:?} {:?} {:?}",
                kind.name(),
                left,
                right,
                true_target,
                false_target
            ),
            None => write!(
                f,
                "if-{}z {:?} {:?} {:?}",
                kind.name(),
                left,
                true_target,
                false_target
            ),
        },
        Switch {
            value,
            keys,
            targets,
            fallthrough,
        } => {
            write!(f, "switch {:?}", value)?;
            for (key, target) in keys.iter().zip(targets) {
                write!(f, " {}:{:?}", key, target)?;
            }
            write!(f, " default:{:?}", fallthrough)
        }
        Goto { target } => write!(f, "goto {:?}", target),
        Return { value: Some(value) } => write!(f, "return {:?}", value),
        Return { value: None } => f.write_str("return"),
        Throw { exception } => write!(f, "throw {:?}", exception),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "library class Ljava/lang/Object; {
  method public <init>()V no-side-effects
}
class LA; extends LB; implements LI; {
  public static final field x I
  method public static <clinit>()V postponable-clinit {
  block0:
    v0 = const 5
    v1 = const-string \"say \\\"hi\\\"\"
    v2 = new-array [I v0
    v3 = add-long v0 v0
    if-gez v0 block1 block2
  block1:
    aput v2 v0 v0
    goto block2
  block2:
    v4 = phi v0 v0
    sput LA;->x:I v4
    v5 = invoke-static LB;->f(I)I v4
    switch v5 1:block3 default:block3
  block3:
    return
  }
}
";

    #[test]
    fn test_print_is_parseable() {
        let app = AppView::read_text(PROGRAM).unwrap();
        let printed = print_program(&app);
        assert_eq!(printed, PROGRAM);
        let reparsed = AppView::read_text(&printed).unwrap();
        assert_eq!(print_program(&reparsed), printed);
    }

    #[test]
    fn test_print_code() {
        let app = AppView::read_text(PROGRAM).unwrap();
        let clinit = app
            .factory()
            .create_class_initializer(DexType::new("LA;"));
        let code = app.method_definition(&clinit).unwrap().code.as_ref().unwrap();
        let printed = print_code(code);
        assert!(printed.starts_with("block0:\n  v0 = const 5\n"));
        assert!(printed.contains("  v4 = phi v0 v0\n"));
    }
}
