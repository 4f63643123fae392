//! Dictionary lookup seam
//!
//! The HTTP clients live in the platform layers. They implement
//! [`DefinitionLookup`] and can reuse [`parse_dictionary_api`] to decode
//! DictionaryAPI.dev payloads.

use serde::Deserialize;

use crate::error::NetworkError;
use crate::models::PartOfSpeech;

/// One meaning returned by a dictionary service
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub word: String,
    pub phonetic: Option<String>,
    pub part_of_speech: PartOfSpeech,
    pub definition: String,
    pub examples: Vec<String>,
    /// URL of a pronunciation recording, if the service provides one
    pub audio_url: Option<String>,
}

/// Source of definitions for a word
pub trait DefinitionLookup {
    /// Look up all meanings of `word`
    ///
    /// An unknown word is `Ok` with an empty list.
    fn lookup(&self, word: &str) -> Result<Vec<LookupResult>, NetworkError>;
}

/// Raw entry from DictionaryAPI.dev
#[derive(Debug, Deserialize)]
struct RawEntry {
    word: String,
    #[serde(default)]
    phonetic: Option<String>,
    #[serde(default)]
    phonetics: Vec<RawPhonetic>,
    #[serde(default)]
    meanings: Vec<RawMeaning>,
}

#[derive(Debug, Deserialize)]
struct RawPhonetic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeaning {
    #[serde(default)]
    part_of_speech: String,
    #[serde(default)]
    definitions: Vec<RawDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(default)]
    definition: String,
    #[serde(default)]
    example: Option<String>,
}

/// Error body DictionaryAPI.dev returns for unknown words
#[derive(Debug, Deserialize)]
struct RawNotFound {
    title: String,
}

/// Decode a DictionaryAPI.dev response body
///
/// Each definition of each meaning becomes one [`LookupResult`]. The
/// "No Definitions Found" body decodes to an empty list.
pub fn parse_dictionary_api(body: &str) -> Result<Vec<LookupResult>, NetworkError> {
    if body.trim().is_empty() {
        return Err(NetworkError::NoData);
    }

    let entries: Vec<RawEntry> = match serde_json::from_str(body) {
        Ok(entries) => entries,
        Err(e) => {
            if let Ok(not_found) = serde_json::from_str::<RawNotFound>(body) {
                log::debug!("Dictionary lookup: {}", not_found.title);
                return Ok(Vec::new());
            }
            return Err(NetworkError::Decoding(e.to_string()));
        }
    };

    let mut results = Vec::new();
    for entry in entries {
        let phonetic = entry.phonetic.clone().or_else(|| {
            entry
                .phonetics
                .iter()
                .find_map(|p| p.text.clone().filter(|t| !t.is_empty()))
        });
        let audio_url = entry
            .phonetics
            .iter()
            .find_map(|p| p.audio.clone().filter(|a| !a.is_empty()));

        for meaning in &entry.meanings {
            let part_of_speech = PartOfSpeech::parse(&meaning.part_of_speech);
            for def in &meaning.definitions {
                if def.definition.trim().is_empty() {
                    continue;
                }
                results.push(LookupResult {
                    word: entry.word.clone(),
                    phonetic: phonetic.clone(),
                    part_of_speech,
                    definition: def.definition.trim().to_string(),
                    examples: def.example.iter().cloned().collect(),
                    audio_url: audio_url.clone(),
                });
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = r#"[{
        "word": "hello",
        "phonetics": [{"text": "", "audio": ""}, {"text": "/həˈləʊ/", "audio": "https://example.com/hello.mp3"}],
        "meanings": [
            {"partOfSpeech": "interjection", "definitions": [{"definition": "Used as a greeting.", "example": "Hello, everyone."}]},
            {"partOfSpeech": "noun", "definitions": [{"definition": "An utterance of hello."}, {"definition": "  "}]}
        ]
    }]"#;

    #[test]
    fn test_parse_meanings() {
        let results = parse_dictionary_api(HELLO).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].part_of_speech, PartOfSpeech::Interjection);
        assert_eq!(results[0].examples, vec!["Hello, everyone."]);
        assert_eq!(results[0].phonetic.as_deref(), Some("/həˈləʊ/"));
        assert_eq!(
            results[1].audio_url.as_deref(),
            Some("https://example.com/hello.mp3")
        );
        assert!(results[1].examples.is_empty());
    }

    #[test]
    fn test_not_found_body() {
        let body = r#"{"title":"No Definitions Found","message":"Sorry pal","resolution":"Try again"}"#;
        assert!(parse_dictionary_api(body).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_body() {
        assert!(matches!(
            parse_dictionary_api("<html>oops</html>"),
            Err(NetworkError::Decoding(_))
        ));
        assert_eq!(parse_dictionary_api("  "), Err(NetworkError::NoData));
    }
}
