//! Run metadata from the CI environment (GitHub Actions variables).

use billmail_core::RunMetadata;

pub fn run_metadata(name: &str, env: impl Fn(&str) -> Option<String>) -> RunMetadata {
    let var = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    RunMetadata {
        name: name.to_string(),
        commit_id: var("GITHUB_SHA"),
        repository: var("GITHUB_REPOSITORY"),
        run_id: var("GITHUB_RUN_ID"),
        triggered_by: var("GITHUB_ACTOR"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_env() {
        let meta = run_metadata("Process Bills Workflow", |k| match k {
            "GITHUB_SHA" => Some("0a1b2c3".to_string()),
            "GITHUB_REPOSITORY" => Some("octo/bills".to_string()),
            "GITHUB_RUN_ID" => Some("991".to_string()),
            "GITHUB_ACTOR" => Some("octocat".to_string()),
            _ => None,
        });
        assert_eq!(meta.commit_id.as_deref(), Some("0a1b2c3"));
        assert_eq!(meta.url().as_deref(), Some("https://github.com/octo/bills/actions/runs/991"));
        assert_eq!(meta.triggered_by.as_deref(), Some("octocat"));
    }

    #[test]
    fn test_local_run_has_no_metadata() {
        let meta = run_metadata("bills", |k| (k == "GITHUB_RUN_ID").then(|| " ".to_string()));
        assert_eq!(meta.name, "bills");
        assert!(meta.run_id.is_none());
        assert!(meta.url().is_none());
    }
}
