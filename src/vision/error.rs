use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("OCR detection payload for '{image}' is not a JSON list of detections")]
    Payload {
        image: String,
        #[source]
        source: serde_json::Error,
    },
}
