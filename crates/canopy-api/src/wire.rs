//! Request and response envelopes used on the wire.

use canopy_core::{BranchInfo, DirectoryEntry, EntryKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchesResponse {
    #[serde(default)]
    pub branches: Vec<BranchInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ConfigResponse {
    #[serde(default)]
    pub ignored_directories: Vec<String>,
}

/// Error body: servers use either `error` or `message`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: Option<String>,
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message).filter(|m| !m.trim().is_empty())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PathsBody<'a> {
    pub paths: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct CommitBody<'a> {
    pub message: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckoutBody<'a> {
    pub branch: &'a str,
    pub create: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RenameBody<'a> {
    pub path: &'a str,
    pub new_name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateBody<'a> {
    pub path: &'a str,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_prefers_error_field() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"sensitive file","message":"other"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("sensitive file"));
    }

    #[test]
    fn test_error_body_blank_is_none() {
        let body: ErrorBody = serde_json::from_str(r#"{"message":"  "}"#).unwrap();
        assert!(body.into_message().is_none());
    }

    #[test]
    fn test_bodies_serialize_to_wire_names() {
        let rename = serde_json::to_value(RenameBody {
            path: "a.ts",
            new_name: "b.ts",
        })
        .unwrap();
        assert_eq!(rename["newName"], "b.ts");

        let create = serde_json::to_value(CreateBody {
            path: "src",
            kind: EntryKind::Folder,
        })
        .unwrap();
        assert_eq!(create["type"], "folder");
    }
}
