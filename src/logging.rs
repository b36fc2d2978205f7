use anyhow::Context as _;

/// HTML parser crates are chatty at `debug`; keep them quiet unless asked for by name.
const DEFAULT_DIRECTIVES: &str = "info,html5ever=warn,selectors=warn";

/// Build the filter from `RUST_LOG` when set, otherwise from the defaults.
fn env_filter(from_env: Option<&str>) -> anyhow::Result<tracing_subscriber::EnvFilter> {
    let directives = from_env
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);
    tracing_subscriber::EnvFilter::try_new(directives)
        .with_context(|| format!("parse log filter {directives:?}"))
}

/// Install the stderr subscriber; stdout stays reserved for summaries.
pub fn init() -> anyhow::Result<()> {
    let from_env = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(from_env.as_deref()).context("build log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_when_unset_or_blank() -> anyhow::Result<()> {
        assert_eq!(
            env_filter(None)?.to_string(),
            env_filter(Some(DEFAULT_DIRECTIVES))?.to_string()
        );
        assert_eq!(env_filter(Some("  "))?.to_string(), env_filter(None)?.to_string());
        Ok(())
    }

    #[test]
    fn rejects_garbage_directives() {
        let err = env_filter(Some("recipebook=loud")).expect_err("invalid filter");
        assert!(format!("{err:#}").contains("parse log filter"));
    }
}
