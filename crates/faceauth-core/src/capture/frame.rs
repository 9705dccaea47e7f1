use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::time::Instant;

/// One still grabbed from the live video.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the capture cycle, starting at 0
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub mime: String,
    /// Compressed image bytes
    pub data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    /// `data:<mime>;base64,<payload>`, the form the authenticator decodes
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}

/// Encode a capture for submission, keeping capture order.
pub fn encode_frames(frames: &[Frame]) -> Vec<String> {
    frames.iter().map(Frame::to_data_url).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: usize, data: &[u8]) -> Frame {
        Frame {
            index,
            width: 640,
            height: 480,
            mime: "image/jpeg".to_string(),
            data: data.to_vec(),
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_data_url_format() {
        let url = frame(0, b"hello").to_data_url();
        assert_eq!(url, "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn test_encode_frames_keeps_order() {
        let frames = vec![frame(0, b"a"), frame(1, b"b"), frame(2, b"c")];
        let encoded = encode_frames(&frames);
        assert_eq!(encoded.len(), 3);
        assert!(encoded[0].ends_with("YQ=="));
        assert!(encoded[1].ends_with("Yg=="));
        assert!(encoded[2].ends_with("Yw=="));
    }
}
