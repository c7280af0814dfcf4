use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("mapping error: {0}")]
    Mapping(#[from] avesa_mapping::MappingError),

    #[error("blob store error: {0}")]
    Blob(#[from] avesa_interface::BlobStoreError),

    #[error("column store error: {0}")]
    Column(#[from] avesa_interface::column::ColumnStoreError),

    #[error("raw blob codec error: {0}")]
    RawCodec(#[from] avesa_interface::RawCodecError),

    #[error("no mapping resolved for {service}:{endpoint}")]
    UnmappedEndpoint { service: String, endpoint: String },

    #[error("reject ratio {actual:.1}% exceeds the configured maximum of {max:.1}%")]
    RejectRatioExceeded { actual: f64, max: f64 },
}

pub type Result<T> = std::result::Result<T, CanonicalError>;

impl From<CanonicalError> for avesa_core::AvesaError {
    fn from(err: CanonicalError) -> Self {
        match err {
            CanonicalError::Mapping(e) => avesa_core::AvesaError::MappingError(e.to_string()),
            CanonicalError::Blob(e) => e.into(),
            CanonicalError::Column(e) => e.into(),
            CanonicalError::RawCodec(e) => avesa_core::AvesaError::Transient(e.to_string()),
            CanonicalError::UnmappedEndpoint { service, endpoint } => {
                avesa_core::AvesaError::MappingError(format!("no mapping resolved for {service}:{endpoint}"))
            }
            CanonicalError::RejectRatioExceeded { actual, max } => {
                avesa_core::AvesaError::RecordReject(format!("reject ratio {actual:.1}% exceeds max {max:.1}%"))
            }
        }
    }
}
