use std::net::SocketAddr;

use clap::Parser;

use crate::corrections::BestChoicePolicy;

#[derive(Parser, Debug, Clone)]
#[command(name = "redline-api", about = "Community feedback board service")]
pub struct Config {
    /// SQLite database file
    #[arg(long, env = "DATABASE_URL", default_value = "redline.db")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Origin allowed to call the API from a browser
    #[arg(long, env = "CORS_ORIGIN", default_value = "http://localhost:5173")]
    pub cors_origin: String,

    /// Secret used to verify bearer tokens
    #[arg(long, env = "JWT_SECRET", default_value = "dev-secret-change-me")]
    pub jwt_secret: String,

    /// Upstream suggestion service; suggestions are disabled when unset
    #[arg(long, env = "SUGGEST_URL")]
    pub suggest_url: Option<String>,

    /// Who may designate a post's best correction
    #[arg(long, env = "BEST_CHOICE_POLICY", value_enum, default_value = "anyone")]
    pub best_choice: BestChoicePolicy,

    /// Recompute cached vote counts from the ledger before serving
    #[arg(long)]
    pub rebuild_counts: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_override_defaults() {
        let config = Config::parse_from([
            "redline-api",
            "--database-url",
            "/tmp/board.db",
            "--bind",
            "127.0.0.1:9000",
            "--best-choice",
            "author-only",
            "--suggest-url",
            "http://localhost:7000/suggest",
            "--rebuild-counts",
        ]);
        assert_eq!(config.database_url, "/tmp/board.db");
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.best_choice, BestChoicePolicy::AuthorOnly);
        assert_eq!(
            config.suggest_url.as_deref(),
            Some("http://localhost:7000/suggest")
        );
        assert!(config.rebuild_counts);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = Config::try_parse_from(["redline-api", "--best-choice", "moderators"]);
        assert!(result.is_err());
    }
}
