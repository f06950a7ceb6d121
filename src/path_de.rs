use serde::de::DeserializeOwned;

/// Deserialization failure with the document path it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub path: String,
    pub message: String,
}

/// Deserialize YAML with path context in error messages (`input.required[1]`).
pub fn from_yaml_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, PathError> {
    let de = serde_yaml::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(PathError { path, message: err.into_inner().to_string() })
        }
    }
}
