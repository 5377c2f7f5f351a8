use clap::Parser;

/// Migrate legacy user accounts into the salary application store.
#[derive(Parser, Debug)]
#[command(name = "staffsync", version, about)]
pub struct Cli {
    /// Drop every target table and rebuild the schema before migrating.
    #[arg(long)]
    pub reset: bool,

    /// Confirm the destructive wipe. Required with --reset.
    #[arg(long)]
    pub yes: bool,

    /// Reconcile and report without writing to the target store.
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// The reset wipe never runs on an unconfirmed invocation; a dry run
    /// is always allowed since it writes nothing.
    pub fn ensure_confirmed(&self) -> anyhow::Result<()> {
        if self.reset && !self.yes && !self.dry_run {
            anyhow::bail!("--reset drops every target table; re-run with --yes to confirm, or use --dry-run");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_invocation_takes_no_flags() {
        let cli = Cli::try_parse_from(["staffsync"]).expect("should parse");
        assert!(!cli.reset && !cli.yes && !cli.dry_run);
        cli.ensure_confirmed().expect("plain run needs no confirmation");
    }

    #[test]
    fn reset_requires_confirmation() {
        let cli = Cli::try_parse_from(["staffsync", "--reset"]).expect("should parse");
        assert!(cli.ensure_confirmed().is_err());

        let cli = Cli::try_parse_from(["staffsync", "--reset", "--yes"]).expect("should parse");
        cli.ensure_confirmed().expect("confirmed reset is allowed");
    }

    #[test]
    fn dry_run_reset_needs_no_confirmation() {
        let cli =
            Cli::try_parse_from(["staffsync", "--reset", "--dry-run"]).expect("should parse");
        cli.ensure_confirmed().expect("dry run writes nothing");
    }
}
