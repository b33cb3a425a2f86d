//! BOSH director command line credentials

use crate::{Error, Result};

const CREDHUB_PORT: u16 = 8844;

/// Parse `bosh_commandline_credentials` into environment pairs.
///
/// Ops Manager renders the credentials as a shell prefix
/// (`BOSH_CLIENT=.. BOSH_CLIENT_SECRET=.. BOSH_CA_CERT=.. BOSH_ENVIRONMENT=.. bosh `).
/// The director's UAA client is also authorized against CredHub, so the
/// matching `CREDHUB_*` variables are derived and appended.
pub fn parse_director_credentials(credential: &str) -> Result<Vec<(String, String)>> {
    let mut env: Vec<(String, String)> = credential
        .split_whitespace()
        .filter_map(|token| token.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if env.is_empty() {
        return Err(Error::external(
            "get director credentials",
            "bosh_commandline_credentials",
            "credential contains no environment variables",
        ));
    }

    let derived: Vec<(String, String)> = env
        .iter()
        .filter_map(|(key, value)| {
            let derived = match key.as_str() {
                "BOSH_CLIENT" => ("CREDHUB_CLIENT", value.clone()),
                "BOSH_CLIENT_SECRET" => ("CREDHUB_SECRET", value.clone()),
                "BOSH_CA_CERT" => ("CREDHUB_CA_CERT", value.clone()),
                "BOSH_ENVIRONMENT" => (
                    "CREDHUB_SERVER",
                    format!("https://{}:{}", value, CREDHUB_PORT),
                ),
                _ => return None,
            };
            Some((derived.0.to_string(), derived.1))
        })
        .collect();

    env.extend(derived);
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn bosh_variables_are_kept_and_credhub_variables_derived() {
        let env = parse_director_credentials(
            "BOSH_CLIENT=ops_manager BOSH_CLIENT_SECRET=s3cr3t BOSH_CA_CERT=/var/tempest/workspaces/default/root_ca_certificate BOSH_ENVIRONMENT=10.0.0.5 bosh ",
        )
        .unwrap();

        assert_eq!(lookup(&env, "BOSH_CLIENT"), Some("ops_manager"));
        assert_eq!(lookup(&env, "BOSH_ENVIRONMENT"), Some("10.0.0.5"));
        assert_eq!(lookup(&env, "CREDHUB_CLIENT"), Some("ops_manager"));
        assert_eq!(lookup(&env, "CREDHUB_SECRET"), Some("s3cr3t"));
        assert_eq!(
            lookup(&env, "CREDHUB_CA_CERT"),
            Some("/var/tempest/workspaces/default/root_ca_certificate")
        );
        assert_eq!(lookup(&env, "CREDHUB_SERVER"), Some("https://10.0.0.5:8844"));
        assert_eq!(env.len(), 8);
    }

    #[test]
    fn values_may_contain_equals_signs() {
        let env = parse_director_credentials("BOSH_CLIENT_SECRET=abc== bosh ").unwrap();
        assert_eq!(lookup(&env, "CREDHUB_SECRET"), Some("abc=="));
    }

    #[test]
    fn credential_without_variables_is_rejected() {
        assert!(parse_director_credentials("bosh ").is_err());
        assert!(parse_director_credentials("").is_err());
    }
}
