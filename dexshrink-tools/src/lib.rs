use dexshrink_core::DexType;
use dexshrink_ir::ClassInitializerSideEffect;
use std::io::Read;

pub fn read_input_string(path: &std::path::Path) -> anyhow::Result<String> {
    if path.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read input file {:?}: {}", path, e))
    }
}

/// Installs `env_logger`, defaulting to `debug` when `verbose` and `warn`
/// otherwise. `RUST_LOG` still takes precedence.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .try_init();
}

/// One `LFoo; VERDICT` line per class, in descriptor order.
pub fn format_verdicts(results: &[(DexType, ClassInitializerSideEffect)]) -> String {
    let mut out = String::new();
    for (ty, verdict) in results {
        out.push_str(&format!("{} {}\n", ty, verdict));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_verdicts() {
        let results = vec![
            (DexType::new("LA;"), ClassInitializerSideEffect::None),
            (
                DexType::new("LB;"),
                ClassInitializerSideEffect::SideEffectsThatCannotBePostponed,
            ),
        ];
        assert_eq!(
            format_verdicts(&results),
            "LA; NONE\nLB; SIDE_EFFECTS_THAT_CANNOT_BE_POSTPONED\n"
        );
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_input_string(std::path::Path::new("/nonexistent/program.dex.txt"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read input file"));
    }
}
