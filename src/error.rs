use thiserror::Error;

#[derive(Debug, Error)]
pub enum LdscError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no SNPs remain after {step}")]
    EmptyMerge { step: String },

    #[error("all LD Scores have zero variance")]
    DegenerateInput,

    #[error(
        "LD Score matrix condition number is {condition_number:.0}, above the limit of {threshold:.0}; remove collinear LD Scores or set --invert-anyway"
    )]
    IllConditioned {
        condition_number: f64,
        threshold: f64,
    },

    #[error("invalid base {0:?}; expected one of A, C, G, T")]
    InvalidBase(char),

    #[error("missing column {column} in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LdscError>;
