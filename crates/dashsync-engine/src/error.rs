use dashsync_io::IoError;
use thiserror::Error;

/// Failure reported by a provider client. Passed through the reconciler unchanged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned HTTP {code}: {body}")]
    Status {
        provider: &'static str,
        code: u16,
        body: String,
    },
    #[error("{provider} API error {code}: {message}")]
    Api {
        provider: &'static str,
        code: i64,
        message: String,
    },
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} authentication failed: {message}")]
    Auth {
        provider: &'static str,
        message: String,
    },
    /// The provider refused the request itself (bad filter, unknown campaign).
    #[error("{provider} rejected the request: {message}")]
    Rejected {
        provider: &'static str,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Decode { provider, .. }
            | ProviderError::Auth { provider, .. }
            | ProviderError::Rejected { provider, .. } => *provider,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ProviderError::Rejected { .. })
    }
}

/// Errors that abort a sheet's reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{sheet}: configuration columns have unequal lengths ({detail})")]
    TemplateLengthMismatch { sheet: String, detail: String },

    #[error("{sheet}: configuration column `{column}` is missing")]
    MissingTemplateColumn { sheet: String, column: String },

    #[error("{sheet}!{cell}: `{value}` is not a valid {column}")]
    InvalidTemplateValue {
        sheet: String,
        cell: String,
        column: String,
        value: String,
    },

    #[error("{sheet}!{cell}: unknown column label `{label}`")]
    UnknownColumn {
        sheet: String,
        cell: String,
        label: String,
    },

    #[error("{sheet}!{cell}: path `{path}` has more than two segments")]
    PathTooDeep {
        sheet: String,
        cell: String,
        path: String,
    },

    #[error("{sheet}!{cell}: unrecognized row `{value}`")]
    UnrecognizedRow {
        sheet: String,
        cell: String,
        value: String,
    },

    #[error("{sheet}!{cell}: unsupported metrics combination `{metrics}`")]
    UnsupportedMetrics {
        sheet: String,
        cell: String,
        metrics: String,
    },

    #[error("{sheet}!{cell}: `{value}` is not a period (expected YYYY-MM)")]
    InvalidPeriod {
        sheet: String,
        cell: String,
        value: String,
    },

    #[error("{sheet}!{cell}: `{column}` needs `{input}` in the same row")]
    MissingInput {
        sheet: String,
        cell: String,
        column: String,
        input: String,
    },

    #[error("{sheet}!{cell}: invalid url `{url}`: {reason}")]
    InvalidUrl {
        sheet: String,
        cell: String,
        url: String,
        reason: String,
    },

    #[error("{sheet}: no header row declares row type `{kind}`")]
    MissingHeaderRow { sheet: String, kind: String },

    #[error("{sheet}!{cell}: provider returned campaign `{found}` for `{requested}`")]
    CampaignMismatch {
        sheet: String,
        cell: String,
        requested: String,
        found: String,
    },

    #[error("{sheet}!{cell}: no click record for `{url}`")]
    ClickNotFound {
        sheet: String,
        cell: String,
        url: String,
    },

    #[error("{sheet}!{cell}: analytics row appears before any campaign date row")]
    MissingCampaignContext { sheet: String, cell: String },

    #[error("account `{account}` has no website to attribute statistics to")]
    NoWebsite { account: String },

    #[error("{sheet}: no {provider} provider configured")]
    MissingProvider {
        sheet: String,
        provider: &'static str,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl ReconcileError {
    /// Configuration errors are fixed by editing the workbook or settings; retrying cannot help.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, ReconcileError::Provider(_) | ReconcileError::Io(_))
    }
}
