use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
///
/// Unset variables keep their placeholder; the validator reports them later.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static regex");
    let mut result = content.to_string();

    for caps in re.captures_iter(content) {
        let var_name = caps.get(1).or(caps.get(2)).map(|m| m.as_str()).unwrap_or_default();
        let placeholder = &caps[0];

        match env::var(var_name) {
            Ok(value) => {
                debug!(var = var_name, "Substituting environment variable");
                result = result.replace(placeholder, &value);
            }
            Err(_) => {
                warn!(var = var_name, "Environment variable not set, keeping placeholder");
            }
        }
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    let re = Regex::new(r"\$\{(\w+)\}|\$(\w+)").expect("static regex");
    re.is_match(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_known_var() {
        env::set_var("BOOKSWAP_TEST_REGION", "london");
        let out = substitute_env_vars("region: ${BOOKSWAP_TEST_REGION}").unwrap();
        assert_eq!(out, "region: london");
    }

    #[test]
    fn test_keeps_unknown_var() {
        let out = substitute_env_vars("region: ${BOOKSWAP_NO_SUCH_VAR_XYZ}").unwrap();
        assert!(has_unresolved_env_vars(&out));
    }
}
