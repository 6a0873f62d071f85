use thiserror::Error;

#[derive(Error, Debug)]
pub enum MpraError {
    #[error("Invalid configuration: {msg}")]
    Configuration { msg: String },

    #[error("Malformed input for {context}: {msg}")]
    InputFormat { context: String, msg: String },

    #[error("File at {:?} not found.", path)]
    FileNotFound { path: std::path::PathBuf },

    #[error("File at {:?} is invalid{}.", path, MpraError::format_msg_as_detail(msg))]
    FileNotValid {
        path: std::path::PathBuf,
        msg: Option<String>,
    },

    #[error("Failed parsing {}{}", context, MpraError::format_msg_as_detail(msg))]
    ParseError {
        context: String,
        msg: Option<String>,
    },
}

impl MpraError {
    #[cold]
    pub fn configuration<M: Into<String>>(msg: M) -> Self {
        MpraError::Configuration { msg: msg.into() }
    }

    #[cold]
    pub fn input_format<C: Into<String>, M: Into<String>>(context: C, msg: M) -> Self {
        MpraError::InputFormat {
            context: context.into(),
            msg: msg.into(),
        }
    }

    #[cold]
    pub fn file_not_found<P: AsRef<std::path::Path>>(path: P) -> Self {
        MpraError::FileNotFound {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cold]
    pub fn file_not_valid<P: AsRef<std::path::Path>, M: Into<String>>(
        path: P,
        msg: Option<M>,
    ) -> Self {
        MpraError::FileNotValid {
            path: path.as_ref().to_path_buf(),
            msg: msg.map(|m| m.into()),
        }
    }

    #[cold]
    pub fn parse_error<C: Into<String>, M: Into<String>>(context: C, msg: Option<M>) -> Self {
        MpraError::ParseError {
            context: context.into(),
            msg: msg.map(|m| m.into()),
        }
    }

    pub fn format_msg_as_detail(msg: &Option<String>) -> String {
        match msg {
            Some(m) => format!(" ({})", m),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = MpraError::file_not_valid("a.tsv", Some("no header"));
        assert_eq!(e.to_string(), "File at \"a.tsv\" is invalid (no header).");

        let e = MpraError::file_not_valid::<_, String>("a.tsv", None);
        assert_eq!(e.to_string(), "File at \"a.tsv\" is invalid.");

        let e = MpraError::input_format("HepG2_1_DNA", "read length mismatch");
        assert_eq!(
            e.to_string(),
            "Malformed input for HepG2_1_DNA: read length mismatch"
        );
    }
}
