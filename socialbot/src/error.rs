use thiserror::Error;

/// Conditions the command dispatcher needs to tell apart.
///
/// Everything else travels as a plain `anyhow` chain; these variants are
/// attached to that chain so `main` can pick an exit code with
/// `anyhow::Error::downcast_ref`.
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("contact not found in important contacts: {0}")]
    ContactNotFound(String),
    #[error("no RSS feed configured for {0}")]
    NoFeed(String),
    #[error("no subject found in response")]
    MissingSubject,
}

impl AssistantError {
    pub fn is_config(&self) -> bool {
        matches!(self, AssistantError::Config(_))
    }
}

/// Process exit code for a failed command.
///
/// Configuration problems (anything that fails before a remote call could
/// even be attempted) exit with 2, everything else with 1.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    let is_config = err.chain().any(|cause| {
        cause
            .downcast_ref::<AssistantError>()
            .map(AssistantError::is_config)
            .unwrap_or(false)
            || cause.downcast_ref::<common::ContactError>().is_some()
    });
    if is_config {
        2
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_map_to_two() {
        let err = anyhow::Error::new(AssistantError::Config("missing api key".into()))
            .context("failed to initialize assistant");
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn contact_validation_maps_to_two() {
        let res: Result<(), common::ContactError> = Err(common::ContactError::MissingEmail);
        let err = res.context("Invalid contact data").unwrap_err();
        assert_eq!(exit_code_for(&err), 2);
    }

    #[test]
    fn operation_errors_map_to_one() {
        let err = anyhow::Error::new(AssistantError::MissingSubject)
            .context("failed to parse email response");
        assert_eq!(exit_code_for(&err), 1);
        assert_eq!(exit_code_for(&anyhow::anyhow!("LLM API error 500")), 1);
    }
}
