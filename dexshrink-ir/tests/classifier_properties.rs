use dexshrink_core::DexType;
use dexshrink_ir::{AppView, ClassInitializerSideEffect, ClassInitializerSideEffectAnalysis};
use proptest::prelude::*;

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
  method static pure()I no-side-effects
}
";

/// One straight-line fragment of a generated `LA;.<clinit>`.
#[derive(Debug, Clone)]
enum Stmt {
    OwnConst(i32),
    OwnFromEnv,
    OwnFromCall,
    ForeignWrite(i32),
    CallRun,
    LocalArray { size: i32, index: i32 },
    ForeignArray,
    GuardedOwn(i32),
    PublishArray(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Observed {
    Nothing,
    OwnWrite,
    EnvironmentDependentWrite,
    ForeignEffect,
}

impl Stmt {
    fn observed(&self) -> Observed {
        match self {
            Stmt::OwnConst(_) | Stmt::PublishArray(_) => Observed::OwnWrite,
            Stmt::OwnFromEnv | Stmt::OwnFromCall | Stmt::GuardedOwn(_) => {
                Observed::EnvironmentDependentWrite
            }
            Stmt::ForeignWrite(_) | Stmt::CallRun | Stmt::ForeignArray => Observed::ForeignEffect,
            Stmt::LocalArray { size, index } if index >= size => Observed::ForeignEffect,
            Stmt::LocalArray { .. } => Observed::Nothing,
        }
    }
}

fn stmt() -> impl Strategy<Value = Stmt> {
    prop_oneof![
        any::<i32>().prop_map(Stmt::OwnConst),
        Just(Stmt::OwnFromEnv),
        Just(Stmt::OwnFromCall),
        any::<i32>().prop_map(Stmt::ForeignWrite),
        Just(Stmt::CallRun),
        (0..4i32, 0..4i32).prop_map(|(size, index)| Stmt::LocalArray { size, index }),
        Just(Stmt::ForeignArray),
        any::<i32>().prop_map(Stmt::GuardedOwn),
        (0..4i32).prop_map(Stmt::PublishArray),
    ]
}

struct Emitter {
    lines: Vec<String>,
    next_value: usize,
    next_block: usize,
}

impl Emitter {
    fn value(&mut self) -> String {
        self.next_value += 1;
        format!("v{}", self.next_value - 1)
    }

    fn emit(&mut self, line: String) {
        self.lines.push(line);
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::OwnConst(k) => {
                let v = self.value();
                self.emit(format!("{v} = const {k}"));
                self.emit(format!("sput LA;->x:I {v}"));
            }
            Stmt::OwnFromEnv => {
                let v = self.value();
                self.emit(format!("{v} = sget LEnv;->flag:I"));
                self.emit(format!("sput LA;->x:I {v}"));
            }
            Stmt::OwnFromCall => {
                let v = self.value();
                self.emit(format!("{v} = invoke-static LOther;->pure()I"));
                self.emit(format!("sput LA;->x:I {v}"));
            }
            Stmt::ForeignWrite(k) => {
                let v = self.value();
                self.emit(format!("{v} = const {k}"));
                self.emit(format!("sput LOther;->y:I {v}"));
            }
            Stmt::CallRun => self.emit("invoke-static LOther;->run()V".to_string()),
            Stmt::LocalArray { size, index } => {
                let (s, a, i) = (self.value(), self.value(), self.value());
                self.emit(format!("{s} = const {size}"));
                self.emit(format!("{a} = new-array [I {s}"));
                self.emit(format!("{i} = const {index}"));
                self.emit(format!("aput {a} {i} {s}"));
            }
            Stmt::ForeignArray => {
                let (a, i) = (self.value(), self.value());
                self.emit(format!("{a} = sget LEnv;->array:[I"));
                self.emit(format!("{i} = const 0"));
                self.emit(format!("aput {a} {i} {i}"));
            }
            Stmt::GuardedOwn(k) => {
                let (c, v) = (self.value(), self.value());
                let (then, join) = (self.next_block, self.next_block + 1);
                self.next_block += 2;
                self.emit(format!("{c} = sget LEnv;->flag:I"));
                self.emit(format!("if-eqz {c} block{then} block{join}"));
                self.emit(format!("block{then}:"));
                self.emit(format!("{v} = const {k}"));
                self.emit(format!("sput LA;->x:I {v}"));
                self.emit(format!("goto block{join}"));
                self.emit(format!("block{join}:"));
            }
            Stmt::PublishArray(size) => {
                let (s, a) = (self.value(), self.value());
                self.emit(format!("{s} = const {size}"));
                self.emit(format!("{a} = new-array [I {s}"));
                self.emit(format!("sput LA;->a:[I {a}"));
            }
        }
    }
}

fn render(stmts: &[Stmt]) -> String {
    let mut emitter = Emitter {
        lines: vec!["block0:".to_string()],
        next_value: 0,
        next_block: 1,
    };
    for stmt in stmts {
        emitter.stmt(stmt);
    }
    emitter.emit("return".to_string());
    format!(
        "{PRELUDE}class LA; {{\n  static field x I\n  static field a [I\n  method static <clinit>()V {{\n{}\n  }}\n}}\n",
        emitter.lines.join("\n")
    )
}

fn expected(stmts: &[Stmt]) -> ClassInitializerSideEffect {
    match stmts.iter().map(Stmt::observed).max() {
        None | Some(Observed::Nothing) => ClassInitializerSideEffect::None,
        Some(Observed::OwnWrite) => ClassInitializerSideEffect::SideEffectsThatCanBePostponed,
        Some(Observed::EnvironmentDependentWrite) | Some(Observed::ForeignEffect) => {
            ClassInitializerSideEffect::SideEffectsThatCannotBePostponed
        }
    }
}

fn classify(app: &AppView) -> ClassInitializerSideEffect {
    let clinit = app
        .factory()
        .create_class_initializer(DexType::new("LA;"));
    let code = app
        .method_definition(&clinit)
        .and_then(|method| method.code.as_ref())
        .expect("LA; has a class initializer");
    ClassInitializerSideEffectAnalysis::class_initializer_can_be_postponed(app, code)
}

proptest! {
    #[test]
    fn classification_matches_observable_behavior(stmts in prop::collection::vec(stmt(), 0..8)) {
        let source = render(&stmts);
        let app = AppView::read_text(&source).expect("generated program should parse");
        let verdict = classify(&app);

        let touches_outside = stmts.iter().any(|s| s.observed() == Observed::ForeignEffect);
        if touches_outside {
            prop_assert!(verdict.cannot_be_postponed(), "{}", source);
        }
        prop_assert_eq!(verdict, expected(&stmts), "{}", source);
    }

    #[test]
    fn classification_is_deterministic(stmts in prop::collection::vec(stmt(), 0..8)) {
        let app = AppView::read_text(&render(&stmts)).expect("generated program should parse");
        prop_assert_eq!(classify(&app), classify(&app));
    }
}
