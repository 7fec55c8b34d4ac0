// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeval contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from setup errors.

use super::ValidatorError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands or snippets to use
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one is known
    pub fn for_error(error: &ValidatorError) -> Option<Self> {
        match error {
            ValidatorError::MissingEnvVar { name } if name == "SYSTEM_ACCESSTOKEN" => {
                Some(Self::map_access_token())
            }
            ValidatorError::MissingEnvVar { name } if name == "SYSTEM_PULLREQUEST_PULLREQUESTID" => {
                Some(Self::run_from_pull_request())
            }
            ValidatorError::MissingCredential => Some(Self::provide_credential()),
            ValidatorError::UnrecognizedRemote { .. } => Some(Self::name_repository()),
            ValidatorError::ToolNotFound { tool } => Some(Self::install_tool(tool)),
            _ => None,
        }
    }

    /// The job token is not exposed to scripts unless mapped explicitly
    pub fn map_access_token() -> Self {
        Self {
            action: "Expose the job access token to pipeval".into(),
            steps: vec![
                "System.AccessToken is only visible to a step that maps it".into(),
                "Add an env mapping to the step that runs pipeval".into(),
            ],
            commands: vec![
                "- script: pipeval pr".into(),
                "  env:".into(),
                "    SYSTEM_ACCESSTOKEN: $(System.AccessToken)".into(),
            ],
        }
    }

    /// PR mode only works from a pull request validation build
    pub fn run_from_pull_request() -> Self {
        Self {
            action: "Run PR mode from a pull request build".into(),
            steps: vec![
                "The pull request id is only set for builds triggered by a PR policy".into(),
                "Use 'pipeval local' to validate a branch outside a pull request".into(),
            ],
            commands: vec!["pipeval local --pat <TOKEN> --branch <BRANCH>".into()],
        }
    }

    /// Local mode needs a token
    pub fn provide_credential() -> Self {
        Self {
            action: "Provide a credential".into(),
            steps: vec![
                "Create a personal access token with Build (Read & execute) scope".into(),
                "Or reuse an Azure CLI login as a bearer token".into(),
            ],
            commands: vec![
                "pipeval local --pat <TOKEN>".into(),
                "".into(),
                "pipeval local --bearer \"$(az account get-access-token \\".into(),
                "  --resource 499b84ac-1321-427f-aa17-267ca6975798 --query accessToken -o tsv)\"".into(),
            ],
        }
    }

    /// The git remote does not point at Azure DevOps
    pub fn name_repository() -> Self {
        Self {
            action: "Name the Azure DevOps repository explicitly".into(),
            steps: vec![
                "The origin remote is not an Azure DevOps URL".into(),
                "Pass the organization, project and repository together".into(),
            ],
            commands: vec!["pipeval local --org <ORG> --project <PROJECT> --repo <REPO> --pat <TOKEN>".into()],
        }
    }

    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        Self {
            action: format!("Install {}", tool),
            steps: vec![
                format!("Install {} and ensure it's in your PATH", tool),
                "Or pass the YAML files to validate as arguments".into(),
            ],
            commands: vec!["pipeval local --pat <TOKEN> azure-pipelines.yml".into()],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_suggestion() {
        let err = ValidatorError::missing_env("SYSTEM_ACCESSTOKEN");
        let suggestion = RecoverySuggestion::for_error(&err).unwrap();
        assert!(suggestion.to_string().contains("$(System.AccessToken)"));
    }

    #[test]
    fn test_no_suggestion_for_run_errors() {
        assert!(RecoverySuggestion::for_error(&ValidatorError::Cancelled).is_none());
    }
}
