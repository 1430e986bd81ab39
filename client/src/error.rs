#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    #[error("Not signed in")]
    Unauthorized,

    #[error("Not allowed")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    InvalidState(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Map a non-success HTTP status (and the server's message) onto the taxonomy.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => ClientError::Validation(message),
            401 => ClientError::Unauthorized,
            403 => ClientError::Forbidden,
            404 => ClientError::NotFound,
            409 => ClientError::InvalidState(message),
            _ => ClientError::Transport(format!("{status}: {message}")),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        assert_eq!(
            ClientError::from_status(400, "empty".into()),
            ClientError::Validation("empty".into())
        );
        assert_eq!(ClientError::from_status(401, String::new()), ClientError::Unauthorized);
        assert_eq!(ClientError::from_status(404, String::new()), ClientError::NotFound);
        assert_eq!(
            ClientError::from_status(409, "wrong post".into()),
            ClientError::InvalidState("wrong post".into())
        );
        assert!(matches!(
            ClientError::from_status(502, "down".into()),
            ClientError::Transport(_)
        ));
    }
}
