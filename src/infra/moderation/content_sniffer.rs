// Magic-number content sniffer.
//
// `infer` recognizes binary signatures (images, video, audio, archives,
// executables, ...) but has no notion of plain text, so buffers that decode
// cleanly as UTF-8 without control garbage fall back to `text/plain`.
// Everything else is `application/octet-stream`.

use crate::core::moderation::ContentSniffer;

const OCTET_STREAM: &str = "application/octet-stream";

pub struct InferSniffer;

impl ContentSniffer for InferSniffer {
    fn sniff(&self, bytes: &[u8]) -> String {
        if bytes.is_empty() {
            return OCTET_STREAM.to_string();
        }

        if let Some(kind) = infer::get(bytes) {
            return kind.mime_type().to_string();
        }

        if looks_like_text(bytes) {
            return "text/plain".to_string();
        }

        OCTET_STREAM.to_string()
    }
}

fn looks_like_text(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(s) => !s
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\r' && c != '\t'),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_png_by_signature_regardless_of_name() {
        let png_header = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
        ];
        assert_eq!(InferSniffer.sniff(&png_header), "image/png");
    }

    #[test]
    fn recognizes_elf_executables() {
        let elf_header = [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01, 0x01, 0x00];
        assert_eq!(InferSniffer.sniff(&elf_header), "application/x-executable");
    }

    #[test]
    fn plain_utf8_falls_back_to_text() {
        assert_eq!(InferSniffer.sniff(b"hello attachment\nsecond line\n"), "text/plain");
    }

    #[test]
    fn binary_noise_is_octet_stream() {
        assert_eq!(InferSniffer.sniff(&[0x00, 0xFF, 0x13, 0x37]), OCTET_STREAM);
    }

    #[test]
    fn empty_buffer_is_octet_stream() {
        assert_eq!(InferSniffer.sniff(&[]), OCTET_STREAM);
    }
}
