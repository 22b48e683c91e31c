use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use dexshrink_ir::validation::validate_app;
use dexshrink_ir::{print_program, AppView, ClassInitializerSideEffects, Pass, PassOptions};
use dexshrink_tools::{format_verdicts, init_logging, read_input_string};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("dexshrink-clinit")
        .about("Classifies the side effects of class initializers")
        .arg(
            Arg::new("input")
                .help("Input program in textual IR, or - for stdin")
                .required(true),
        )
        .arg(
            Arg::new("pass-rounds")
                .long("pass-rounds")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Maximum number of fixpoint rounds"),
        )
        .arg(
            Arg::new("print-ir")
                .long("print-ir")
                .action(ArgAction::SetTrue)
                .help("Print the program, with updated optimization info, after the pass"),
        )
        .arg(
            Arg::new("no-validate")
                .long("no-validate")
                .action(ArgAction::SetTrue)
                .help("Skip validation after the pass"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log each verdict and round"),
        )
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let input_path: PathBuf = matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .context("missing input")?;
    let options = PassOptions {
        validate: !matches.get_flag("no-validate"),
        max_rounds: matches.get_one::<usize>("pass-rounds").copied(),
    };

    let text = read_input_string(&input_path)?;
    let mut app = AppView::read_text(&text)
        .with_context(|| format!("Failed to parse {:?}", input_path))?;

    let mut pass = ClassInitializerSideEffects::with_max_rounds(options.max_rounds);
    pass.run(&mut app);

    if options.validate {
        let (valid, errors) = validate_app(&app);
        if !valid {
            anyhow::bail!("Validation failed after pass '{}':\n{}", pass.name(), errors.join("\n"));
        }
    }

    if matches.get_flag("print-ir") {
        print!("{}", print_program(&app));
    }
    print!("{}", format_verdicts(&pass.sorted_results()));
    Ok(())
}
