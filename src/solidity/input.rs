use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub content: String,
}

/// Standard-json compiler input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompilationInput {
    pub language: String,
    pub sources: BTreeMap<String, Source>,
    pub settings: Value,
}

/// Compiler input together with the contract it is expected to produce.
#[derive(Clone, Debug, PartialEq)]
pub struct FormattedInput {
    pub input: CompilationInput,
    pub file_name: String,
    pub contract_name: String,
}

/// Rebuilds compiler input from contract metadata and the source files it references.
pub trait InputFormatter: Send + Sync {
    fn format(
        &self,
        metadata: &Value,
        sources: &BTreeMap<String, String>,
    ) -> Result<FormattedInput, anyhow::Error>;
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default = "default_language")]
    language: String,
    sources: BTreeMap<String, MetadataSource>,
    settings: Map<String, Value>,
}

fn default_language() -> String {
    "Solidity".to_string()
}

#[derive(Debug, Deserialize)]
struct MetadataSource {
    // present when the contract was compiled with `useLiteralContent`
    content: Option<String>,
}

/// Formats solidity metadata (the json embedded into the bytecode by its hash)
/// into standard-json input.
#[derive(Clone, Debug, Default)]
pub struct MetadataFormatter;

impl MetadataFormatter {
    fn output_selection() -> Value {
        json!({
            "*": {
                "*": ["evm.bytecode.object", "evm.deployedBytecode.object", "metadata"]
            }
        })
    }

    fn compilation_target(settings: &mut Map<String, Value>) -> anyhow::Result<(String, String)> {
        let target = settings
            .remove("compilationTarget")
            .ok_or_else(|| anyhow!("compilation target not found"))?;
        let target: BTreeMap<String, String> =
            serde_json::from_value(target).context("invalid compilation target")?;
        if target.len() != 1 {
            return Err(anyhow!(
                "compilation target must contain exactly one contract, found {}",
                target.len()
            ));
        }
        target
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("compilation target not found"))
    }

    /// Metadata keeps libraries as `"path:Name": address`,
    /// while standard-json expects `{"path": {"Name": address}}`.
    fn libraries(libraries: Value) -> anyhow::Result<Value> {
        let libraries: BTreeMap<String, String> =
            serde_json::from_value(libraries).context("invalid libraries")?;
        let mut result: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for (key, address) in libraries {
            let (path, name) = key.rsplit_once(':').unwrap_or(("", key.as_str()));
            result
                .entry(path.to_string())
                .or_default()
                .insert(name.to_string(), address);
        }
        Ok(serde_json::to_value(result)?)
    }
}

impl InputFormatter for MetadataFormatter {
    fn format(
        &self,
        metadata: &Value,
        sources: &BTreeMap<String, String>,
    ) -> Result<FormattedInput, anyhow::Error> {
        let metadata: Metadata =
            serde_json::from_value(metadata.clone()).context("invalid metadata")?;

        let mut settings = metadata.settings;
        let (file_name, contract_name) = Self::compilation_target(&mut settings)?;
        if let Some(libraries) = settings.remove("libraries") {
            settings.insert("libraries".to_string(), Self::libraries(libraries)?);
        }
        settings.insert("outputSelection".to_string(), Self::output_selection());

        let mut input_sources = BTreeMap::new();
        for (name, source) in metadata.sources {
            let content = sources
                .get(&name)
                .cloned()
                .or(source.content)
                .ok_or_else(|| anyhow!("source file {name} is missing"))?;
            input_sources.insert(name, Source { content });
        }

        Ok(FormattedInput {
            input: CompilationInput {
                language: metadata.language,
                sources: input_sources,
                settings: Value::Object(settings),
            },
            file_name,
            contract_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata() -> Value {
        json!({
            "compiler": {"version": "0.8.9+commit.e5eed63a"},
            "language": "Solidity",
            "sources": {
                "contracts/A.sol": {"keccak256": "0x00", "urls": []},
                "contracts/Lib.sol": {"keccak256": "0x01", "content": "library Lib {}"}
            },
            "settings": {
                "compilationTarget": {"contracts/A.sol": "A"},
                "evmVersion": "london",
                "libraries": {
                    "contracts/Lib.sol:Lib": "0x1234567890123456789012345678901234567890"
                },
                "metadata": {"bytecodeHash": "ipfs"},
                "optimizer": {"enabled": true, "runs": 200},
                "remappings": []
            },
            "version": 1
        })
    }

    #[test]
    fn formats_metadata_into_standard_json() {
        let sources = BTreeMap::from([(
            "contracts/A.sol".to_string(),
            "contract A {}".to_string(),
        )]);
        let formatted = MetadataFormatter.format(&metadata(), &sources).unwrap();

        assert_eq!(formatted.file_name, "contracts/A.sol");
        assert_eq!(formatted.contract_name, "A");
        assert_eq!(
            serde_json::to_value(&formatted.input).unwrap(),
            json!({
                "language": "Solidity",
                "sources": {
                    "contracts/A.sol": {"content": "contract A {}"},
                    "contracts/Lib.sol": {"content": "library Lib {}"}
                },
                "settings": {
                    "evmVersion": "london",
                    "libraries": {
                        "contracts/Lib.sol": {
                            "Lib": "0x1234567890123456789012345678901234567890"
                        }
                    },
                    "metadata": {"bytecodeHash": "ipfs"},
                    "optimizer": {"enabled": true, "runs": 200},
                    "outputSelection": {
                        "*": {
                            "*": ["evm.bytecode.object", "evm.deployedBytecode.object", "metadata"]
                        }
                    },
                    "remappings": []
                }
            })
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let err = MetadataFormatter
            .format(&metadata(), &BTreeMap::new())
            .expect_err("A.sol is not provided");
        assert_eq!(err.to_string(), "source file contracts/A.sol is missing");
    }

    #[test]
    fn compilation_target_is_required() {
        let mut metadata = metadata();
        metadata["settings"]
            .as_object_mut()
            .unwrap()
            .remove("compilationTarget");
        let sources = BTreeMap::from([(
            "contracts/A.sol".to_string(),
            "contract A {}".to_string(),
        )]);
        let err = MetadataFormatter
            .format(&metadata, &sources)
            .expect_err("target is missing");
        assert_eq!(err.to_string(), "compilation target not found");
    }

    #[test]
    fn libraries_without_path() {
        let libraries =
            MetadataFormatter::libraries(json!({"Lib": "0x01", "a.sol:Other": "0x02"})).unwrap();
        assert_eq!(
            libraries,
            json!({"": {"Lib": "0x01"}, "a.sol": {"Other": "0x02"}})
        );
    }
}
