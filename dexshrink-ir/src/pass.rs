use crate::program::AppView;
use crate::validation::validate_app;

pub trait Pass {
    fn name(&self) -> &str;
    fn run(&mut self, app: &mut AppView);
}

#[derive(Debug, Clone)]
pub struct PassOptions {
    /// Validate all code after each pass.
    pub validate: bool,
    /// Upper bound on fixpoint rounds of iterative passes; `None` means
    /// until nothing changes.
    pub max_rounds: Option<usize>,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            validate: true,
            max_rounds: None,
        }
    }
}

pub struct PassRunner {
    passes: Vec<Box<dyn Pass>>,
    options: PassOptions,
}

impl Default for PassRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PassRunner {
    pub fn new() -> Self {
        Self::with_options(PassOptions::default())
    }

    pub fn with_options(options: PassOptions) -> Self {
        Self {
            passes: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    pub fn set_validate_globally(&mut self, validate: bool) {
        self.options.validate = validate;
    }

    pub fn add<P: Pass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn get_all_pass_names() -> Vec<&'static str> {
        vec!["class-initializer-side-effects", "print"]
    }

    pub fn add_by_name(&mut self, name: &str) -> bool {
        match name {
            "class-initializer-side-effects" => self.add(
                crate::passes::class_initializer_side_effects::ClassInitializerSideEffects::with_max_rounds(
                    self.options.max_rounds,
                ),
            ),
            "print" => self.add(crate::print::Print),
            _ => return false,
        }
        true
    }

    pub fn run(&mut self, app: &mut AppView) {
        for pass in &mut self.passes {
            log::debug!("running pass {}", pass.name());
            pass.run(app);

            if self.options.validate {
                let (valid, errors) = validate_app(app);
                if !valid {
                    let err_msg = errors.join("\n");
                    panic!(
                        "Validation failed after pass '{}':\n{}",
                        pass.name(),
                        err_msg
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::ClassDef;
    use dexshrink_core::DexType;

    struct MockPass;

    impl Pass for MockPass {
        fn name(&self) -> &str {
            "MockPass"
        }

        fn run(&mut self, app: &mut AppView) {
            app.add_class(ClassDef::new(DexType::new("LAdded;")));
        }
    }

    #[test]
    fn test_pass_runner() {
        let mut app = AppView::new();
        let mut runner = PassRunner::new();
        runner.add(MockPass);
        assert_eq!(runner.len(), 1);
        runner.run(&mut app);
        assert!(app.definition_for(DexType::new("LAdded;")).is_some());
    }

    #[test]
    fn test_add_by_name() {
        let mut runner = PassRunner::new();
        for name in PassRunner::get_all_pass_names() {
            assert!(runner.add_by_name(name), "unknown pass {name}");
        }
        assert!(!runner.add_by_name("no-such-pass"));
        assert_eq!(runner.len(), PassRunner::get_all_pass_names().len());
    }
}
