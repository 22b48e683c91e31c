#![no_main]
use arbitrary::Arbitrary;
use dexshrink_core::DexType;
use dexshrink_ir::{AppView, ClassInitializerSideEffectAnalysis};
use libfuzzer_sys::fuzz_target;

const PRELUDE: &str = "
class LEnv; {
  static field flag I
  static field array [I
}
class LOther; {
  static field y I
  method static run()V {
  block0:
    return
  }
}
";

#[derive(Debug, Arbitrary)]
enum Stmt {
    OwnConst(i32),
    OwnFromEnv,
    ForeignWrite(i32),
    CallRun,
    LocalArray(u8, u8),
    ForeignArray,
    Guarded(Box<Stmt>),
}

impl Stmt {
    fn touches_other_classes(&self) -> bool {
        match self {
            Stmt::ForeignWrite(_) | Stmt::CallRun | Stmt::ForeignArray => true,
            Stmt::Guarded(inner) => inner.touches_other_classes(),
            _ => false,
        }
    }
}

struct Emitter {
    lines: Vec<String>,
    values: usize,
    blocks: usize,
}

impl Emitter {
    fn value(&mut self) -> String {
        self.values += 1;
        format!("v{}", self.values)
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::OwnConst(k) => {
                let v = self.value();
                self.lines.push(format!("{v} = const {k}"));
                self.lines.push(format!("sput LA;->x:I {v}"));
            }
            Stmt::OwnFromEnv => {
                let v = self.value();
                self.lines.push(format!("{v} = sget LEnv;->flag:I"));
                self.lines.push(format!("sput LA;->x:I {v}"));
            }
            Stmt::ForeignWrite(k) => {
                let v = self.value();
                self.lines.push(format!("{v} = const {k}"));
                self.lines.push(format!("sput LOther;->y:I {v}"));
            }
            Stmt::CallRun => self.lines.push("invoke-static LOther;->run()V".to_string()),
            Stmt::LocalArray(size, index) => {
                let (s, a, i) = (self.value(), self.value(), self.value());
                self.lines.push(format!("{s} = const {size}"));
                self.lines.push(format!("{a} = new-array [I {s}"));
                self.lines.push(format!("{i} = const {index}"));
                self.lines.push(format!("aput {a} {i} {s}"));
            }
            Stmt::ForeignArray => {
                let (a, i) = (self.value(), self.value());
                self.lines.push(format!("{a} = sget LEnv;->array:[I"));
                self.lines.push(format!("{i} = const 0"));
                self.lines.push(format!("aput {a} {i} {i}"));
            }
            Stmt::Guarded(inner) => {
                let c = self.value();
                let (then, join) = (self.blocks + 1, self.blocks + 2);
                self.blocks += 2;
                self.lines.push(format!("{c} = sget LEnv;->flag:I"));
                self.lines.push(format!("if-nez {c} block{then} block{join}"));
                self.lines.push(format!("block{then}:"));
                self.stmt(inner);
                self.lines.push(format!("goto block{join}"));
                self.lines.push(format!("block{join}:"));
            }
        }
    }
}

fuzz_target!(|stmts: Vec<Stmt>| {
    let mut emitter = Emitter {
        lines: vec!["block0:".to_string()],
        values: 0,
        blocks: 0,
    };
    for stmt in &stmts {
        emitter.stmt(stmt);
    }
    emitter.lines.push("return".to_string());
    let source = format!(
        "{PRELUDE}class LA; {{\n  static field x I\n  method static <clinit>()V {{\n{}\n  }}\n}}\n",
        emitter.lines.join("\n")
    );

    let app = AppView::read_text(&source).expect("generated program should parse");
    let clinit = app.factory().create_class_initializer(DexType::new("LA;"));
    let code = app
        .method_definition(&clinit)
        .and_then(|method| method.code.as_ref())
        .expect("LA; has a class initializer");
    let verdict = ClassInitializerSideEffectAnalysis::class_initializer_can_be_postponed(&app, code);

    assert_eq!(
        verdict,
        ClassInitializerSideEffectAnalysis::class_initializer_can_be_postponed(&app, code)
    );
    if stmts.iter().any(Stmt::touches_other_classes) {
        assert!(verdict.cannot_be_postponed(), "{source}");
    }
});
