//! ABI plumbing for the notes contract
//!
//! Selectors come from Keccak-256 of the canonical signatures and the
//! `string`/`uint256` arguments plus the `(string,string,uint256)[]`
//! return value of `getMyNotes()` go through `alloy_dyn_abi`. Both
//! directions are provided so a test node can speak the same encoding
//! as the client.

use alloy_dyn_abi::{DynSolType, DynSolValue};
use serde::Deserialize;

pub use alloy_primitives::{keccak256, Selector, U256};

use crate::error::ChainError;
use crate::note::RemoteNote;

/// Function names of the notes contract
pub const LIST_NOTES_FN: &str = "getMyNotes";
pub const ADD_NOTE_FN: &str = "addNote";
pub const DELETE_NOTE_FN: &str = "deleteNote";

const LIST_NOTES_SIGNATURE: &str = "getMyNotes()";
const ADD_NOTE_SIGNATURE: &str = "addNote(string,string)";
const DELETE_NOTE_SIGNATURE: &str = "deleteNote(uint256)";
const NOTE_LIST_OUTPUT: &str = "(string,string,uint256)[]";

/// Selector of a canonical signature such as `deleteNote(uint256)`
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

fn note_type() -> DynSolType {
    DynSolType::Tuple(vec![
        DynSolType::String,
        DynSolType::String,
        DynSolType::Uint(256),
    ])
}

fn note_list_type() -> DynSolType {
    DynSolType::Array(Box::new(note_type()))
}

/// Selectors of the three notes contract functions
///
/// Built either from the known contract interface or from a compiled
/// artifact, in which case the artifact must declare all three functions
/// with the expected parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiDescriptor {
    list_notes: Selector,
    add_note: Selector,
    delete_note: Selector,
}

impl Default for AbiDescriptor {
    fn default() -> Self {
        Self::notes_contract()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AbiSource {
    Artifact { abi: Vec<AbiItem> },
    Bare(Vec<AbiItem>),
}

#[derive(Deserialize)]
struct AbiItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    inputs: Vec<AbiParam>,
    #[serde(default)]
    outputs: Vec<AbiParam>,
}

#[derive(Deserialize)]
struct AbiParam {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    components: Vec<AbiParam>,
}

impl AbiParam {
    /// Canonical type string, expanding tuples into `(a,b,...)`
    fn canonical(&self) -> String {
        match self.kind.strip_prefix("tuple") {
            Some(suffix) => {
                let inner: Vec<String> = self.components.iter().map(|c| c.canonical()).collect();
                format!("({}){}", inner.join(","), suffix)
            }
            None => self.kind.clone(),
        }
    }
}

impl AbiItem {
    fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(|p| p.canonical()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }
}

impl AbiDescriptor {
    /// Interface of the deployed notes contract
    pub fn notes_contract() -> Self {
        Self {
            list_notes: selector(LIST_NOTES_SIGNATURE),
            add_note: selector(ADD_NOTE_SIGNATURE),
            delete_note: selector(DELETE_NOTE_SIGNATURE),
        }
    }

    /// Parse a compiled artifact (`{"abi": [...]}`) or a bare ABI array
    pub fn from_artifact_json(json: &str) -> Result<Self, ChainError> {
        let source: AbiSource = serde_json::from_str(json)
            .map_err(|e| ChainError::abi(format!("Unreadable ABI JSON: {}", e)))?;
        let items = match source {
            AbiSource::Artifact { abi } => abi,
            AbiSource::Bare(items) => items,
        };

        let find = |name: &str, expected: &str| -> Result<Selector, ChainError> {
            let item = items
                .iter()
                .filter(|i| i.kind == "function" && i.name == name)
                .find(|i| i.signature() == expected)
                .ok_or_else(|| ChainError::abi(format!("ABI is missing {}", expected)))?;
            Ok(selector(&item.signature()))
        };

        let list_notes = find(LIST_NOTES_FN, LIST_NOTES_SIGNATURE)?;
        let add_note = find(ADD_NOTE_FN, ADD_NOTE_SIGNATURE)?;
        let delete_note = find(DELETE_NOTE_FN, DELETE_NOTE_SIGNATURE)?;

        let list_item = items
            .iter()
            .find(|i| i.kind == "function" && i.name == LIST_NOTES_FN && i.inputs.is_empty());
        let outputs: Vec<String> = list_item
            .map(|i| i.outputs.iter().map(|o| o.canonical()).collect())
            .unwrap_or_default();
        if outputs != [NOTE_LIST_OUTPUT] {
            return Err(ChainError::abi(format!(
                "{} must return {}, ABI declares ({})",
                LIST_NOTES_SIGNATURE,
                NOTE_LIST_OUTPUT,
                outputs.join(",")
            )));
        }

        Ok(Self {
            list_notes,
            add_note,
            delete_note,
        })
    }

    pub fn list_notes_selector(&self) -> Selector {
        self.list_notes
    }

    pub fn add_note_selector(&self) -> Selector {
        self.add_note
    }

    pub fn delete_note_selector(&self) -> Selector {
        self.delete_note
    }

    /// Call data for `getMyNotes()`
    pub fn encode_list_notes(&self) -> Vec<u8> {
        self.list_notes.to_vec()
    }

    /// Call data for `addNote(title, content)`
    pub fn encode_add_note(&self, title: &str, content: &str) -> Vec<u8> {
        let args = DynSolValue::Tuple(vec![
            DynSolValue::String(title.to_string()),
            DynSolValue::String(content.to_string()),
        ]);
        encode_call(self.add_note, args.abi_encode_params())
    }

    /// Call data for `deleteNote(position)`
    pub fn encode_delete_note(&self, position: u64) -> Vec<u8> {
        let args = DynSolValue::Uint(U256::from(position), 256);
        encode_call(self.delete_note, args.abi_encode())
    }
}

fn encode_call(selector: Selector, args: Vec<u8>) -> Vec<u8> {
    let mut data = selector.to_vec();
    data.extend(args);
    data
}

/// Return data of `getMyNotes()` as produced by the contract
pub fn encode_note_list(notes: &[RemoteNote]) -> Vec<u8> {
    let elements = notes
        .iter()
        .map(|note| {
            DynSolValue::Tuple(vec![
                DynSolValue::String(note.title.clone()),
                DynSolValue::String(note.content.clone()),
                DynSolValue::Uint(note.timestamp, 256),
            ])
        })
        .collect();
    DynSolValue::Array(elements).abi_encode()
}

/// Decode the return data of `getMyNotes()`
pub fn decode_note_list(data: &[u8]) -> Result<Vec<RemoteNote>, ChainError> {
    if data.is_empty() {
        return Err(ChainError::abi("Empty return data (is the contract deployed?)"));
    }

    let decoded = note_list_type()
        .abi_decode(data)
        .map_err(|e| ChainError::abi(format!("Bad {} return data: {}", LIST_NOTES_SIGNATURE, e)))?;
    let DynSolValue::Array(elements) = decoded else {
        return Err(ChainError::abi(format!("{} did not return an array", LIST_NOTES_SIGNATURE)));
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| remote_note(index, element))
        .collect()
}

fn remote_note(index: usize, element: DynSolValue) -> Result<RemoteNote, ChainError> {
    let fields = match element {
        DynSolValue::Tuple(fields) => <[DynSolValue; 3]>::try_from(fields).ok(),
        _ => None,
    };
    match fields {
        Some([DynSolValue::String(title), DynSolValue::String(content), DynSolValue::Uint(timestamp, _)]) => {
            Ok(RemoteNote {
                title,
                content,
                timestamp,
            })
        }
        _ => Err(ChainError::abi(format!(
            "Note {} is not a {} element",
            index, NOTE_LIST_OUTPUT
        ))),
    }
}

/// Split call data into its selector and argument bytes
pub fn split_call(data: &[u8]) -> Result<(Selector, &[u8]), ChainError> {
    if data.len() < 4 {
        return Err(ChainError::abi("Call data shorter than a selector"));
    }
    Ok((Selector::from_slice(&data[..4]), &data[4..]))
}

/// Decode the arguments of `addNote(string,string)`
pub fn decode_add_note_args(args: &[u8]) -> Result<(String, String), ChainError> {
    let decoded = DynSolType::Tuple(vec![DynSolType::String, DynSolType::String])
        .abi_decode_params(args)
        .map_err(|e| ChainError::abi(format!("Bad {} arguments: {}", ADD_NOTE_SIGNATURE, e)))?;
    match decoded {
        DynSolValue::Tuple(fields) => match <[DynSolValue; 2]>::try_from(fields) {
            Ok([DynSolValue::String(title), DynSolValue::String(content)]) => Ok((title, content)),
            _ => Err(ChainError::abi(format!("Bad {} arguments", ADD_NOTE_SIGNATURE))),
        },
        _ => Err(ChainError::abi(format!("Bad {} arguments", ADD_NOTE_SIGNATURE))),
    }
}

/// Decode the argument of `deleteNote(uint256)`
pub fn decode_delete_note_args(args: &[u8]) -> Result<U256, ChainError> {
    let decoded = DynSolType::Uint(256)
        .abi_decode(args)
        .map_err(|e| ChainError::abi(format!("Bad {} argument: {}", DELETE_NOTE_SIGNATURE, e)))?;
    match decoded {
        DynSolValue::Uint(index, _) => Ok(index),
        _ => Err(ChainError::abi(format!("Bad {} argument", DELETE_NOTE_SIGNATURE))),
    }
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse hex with or without `0x` prefix
pub fn from_hex(text: &str) -> Result<Vec<u8>, ChainError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    hex::decode(digits).map_err(|e| ChainError::invalid_response(format!("Bad hex {:?}: {}", text, e)))
}
