//! Artifact catalog.
//!
//! Every engine variant the server can load is described here: which files
//! make up its on-disk artifact, where to fetch them, and which small
//! metadata files can be regenerated locally when they get damaged.

use std::collections::BTreeSet;

/// Role of a file inside an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Model weights. Large, fetched, never regenerated.
    Weights,
    /// Configuration or vocabulary. Small; may be embedded.
    Metadata,
}

/// One file of an artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactFile {
    pub name: &'static str,
    pub kind: FileKind,
    /// Download location. `None` means the file must be placed by an operator
    /// or is embedded.
    pub url: Option<&'static str>,
    /// Hex SHA-256 of the expected contents, when published.
    pub sha256: Option<&'static str>,
    /// Canonical contents for files that can be written without a download.
    pub contents: Option<&'static str>,
}

impl ArtifactFile {
    const fn weights(name: &'static str, url: Option<&'static str>) -> Self {
        Self {
            name,
            kind: FileKind::Weights,
            url,
            sha256: None,
            contents: None,
        }
    }

    /// Weights with a published SHA-256.
    pub const fn weights_with_sha256(name: &'static str, url: Option<&'static str>, sha256: &'static str) -> Self {
        Self {
            name,
            kind: FileKind::Weights,
            url,
            sha256: Some(sha256),
            contents: None,
        }
    }

    const fn fetched_metadata(name: &'static str, url: &'static str) -> Self {
        Self {
            name,
            kind: FileKind::Metadata,
            url: Some(url),
            sha256: None,
            contents: None,
        }
    }

    const fn embedded(name: &'static str, contents: &'static str) -> Self {
        Self {
            name,
            kind: FileKind::Metadata,
            url: None,
            sha256: None,
            contents: Some(contents),
        }
    }

    /// Whether the store can produce this file on its own.
    pub fn is_embedded(&self) -> bool {
        self.contents.is_some()
    }
}

/// The full description of one variant's artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSpec {
    /// Variant identifier; also the directory name under the models root.
    pub variant: &'static str,
    pub description: &'static str,
    /// Approximate download size in megabytes
    pub size_mb: u32,
    pub files: &'static [ArtifactFile],
}

impl ArtifactSpec {
    /// The weights file engines load from.
    pub fn weights(&self) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| f.kind == FileKind::Weights)
    }

    pub fn required_files(&self) -> BTreeSet<String> {
        self.files.iter().map(|f| f.name.to_string()).collect()
    }

    pub fn file(&self, name: &str) -> Option<&ArtifactFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

const FI_SPECIALIZED_CONFIG: &str = r#"{
  "model_type": "whisper",
  "language": "fi",
  "hidden_size": 1280,
  "vocab_size": 35,
  "pad_token_id": 0,
  "bos_token_id": 1,
  "eos_token_id": 2,
  "sampling_rate": 16000
}
"#;

const FI_SPECIALIZED_VOCAB: &str = r#"{
  "<pad>": 0,
  "<s>": 1,
  "</s>": 2,
  "<unk>": 3,
  "|": 4,
  "a": 5,
  "b": 6,
  "c": 7,
  "d": 8,
  "e": 9,
  "f": 10,
  "g": 11,
  "h": 12,
  "i": 13,
  "j": 14,
  "k": 15,
  "l": 16,
  "m": 17,
  "n": 18,
  "o": 19,
  "p": 20,
  "q": 21,
  "r": 22,
  "s": 23,
  "t": 24,
  "u": 25,
  "v": 26,
  "w": 27,
  "x": 28,
  "y": 29,
  "z": 30,
  "å": 31,
  "ä": 32,
  "ö": 33,
  "-": 34
}
"#;

macro_rules! whisper_ggml {
    ($variant:literal, $size:literal, $desc:literal) => {
        ArtifactSpec {
            variant: $variant,
            description: $desc,
            size_mb: $size,
            files: &[ArtifactFile::weights(
                concat!("ggml-", $variant, ".bin"),
                Some(concat!(
                    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-",
                    $variant,
                    ".bin"
                )),
            )],
        }
    };
}

/// Catalog of known artifacts.
pub const ARTIFACTS: &[ArtifactSpec] = &[
    whisper_ggml!("tiny", 75, "Whisper tiny, multilingual"),
    whisper_ggml!("base", 142, "Whisper base, multilingual"),
    whisper_ggml!("small", 466, "Whisper small, multilingual"),
    whisper_ggml!("medium", 1533, "Whisper medium, multilingual"),
    whisper_ggml!("large-v3-turbo", 1624, "Whisper large-v3-turbo"),
    whisper_ggml!("tiny-q5_1", 31, "Whisper tiny, 5-bit quantized"),
    whisper_ggml!("base-q5_1", 57, "Whisper base, 5-bit quantized"),
    whisper_ggml!("small-q5_1", 181, "Whisper small, 5-bit quantized"),
    whisper_ggml!("medium-q5_0", 514, "Whisper medium, 5-bit quantized"),
    whisper_ggml!(
        "large-v3-turbo-q5_0",
        547,
        "Whisper large-v3-turbo, 5-bit quantized"
    ),
    ArtifactSpec {
        variant: "fi-specialized",
        description: "Finnish fine-tuned transcriber (weights placed by operator)",
        size_mb: 1200,
        files: &[
            ArtifactFile::weights("ggml-model.bin", None),
            ArtifactFile::embedded("config.json", FI_SPECIALIZED_CONFIG),
            ArtifactFile::embedded("vocab.json", FI_SPECIALIZED_VOCAB),
        ],
    },
    ArtifactSpec {
        variant: "en_US-lessac-medium",
        description: "Neural voice, US English",
        size_mb: 63,
        files: &[
            ArtifactFile::weights(
                "en_US-lessac-medium.onnx",
                Some(
                    "https://huggingface.co/rhasspy/piper-voices/resolve/main/en/en_US/lessac/medium/en_US-lessac-medium.onnx",
                ),
            ),
            ArtifactFile::fetched_metadata(
                "en_US-lessac-medium.onnx.json",
                "https://huggingface.co/rhasspy/piper-voices/resolve/main/en/en_US/lessac/medium/en_US-lessac-medium.onnx.json",
            ),
        ],
    },
    ArtifactSpec {
        variant: "fi_FI-harri-medium",
        description: "Neural voice, Finnish",
        size_mb: 63,
        files: &[
            ArtifactFile::weights(
                "fi_FI-harri-medium.onnx",
                Some(
                    "https://huggingface.co/rhasspy/piper-voices/resolve/main/fi/fi_FI/harri/medium/fi_FI-harri-medium.onnx",
                ),
            ),
            ArtifactFile::fetched_metadata(
                "fi_FI-harri-medium.onnx.json",
                "https://huggingface.co/rhasspy/piper-voices/resolve/main/fi/fi_FI/harri/medium/fi_FI-harri-medium.onnx.json",
            ),
        ],
    },
];

/// Find an artifact by variant name.
pub fn get_artifact(variant: &str) -> Option<&'static ArtifactSpec> {
    ARTIFACTS.iter().find(|a| a.variant == variant)
}

/// All known artifacts.
pub fn list_artifacts() -> &'static [ArtifactSpec] {
    ARTIFACTS
}
