use crate::{compiler::CompilerVersion, Error};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Artifacts of the recompiled target contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecompilationResult {
    pub bytecode: String,
    pub deployed_bytecode: String,
    pub metadata: String,
}

#[derive(Debug, Deserialize)]
struct CompilerOutput {
    #[serde(default)]
    errors: Vec<Diagnostic>,
    contracts: Option<BTreeMap<String, BTreeMap<String, Value>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Diagnostic {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
    formatted_message: Option<String>,
}

impl Diagnostic {
    fn is_error(&self) -> bool {
        self.severity == "error"
    }

    fn text(&self) -> &str {
        self.formatted_message.as_deref().unwrap_or(&self.message)
    }
}

#[derive(Debug, Deserialize)]
struct ContractOutput {
    evm: Evm,
    metadata: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Evm {
    bytecode: BytecodeObject,
    deployed_bytecode: BytecodeObject,
}

#[derive(Debug, Deserialize)]
struct BytecodeObject {
    object: String,
}

/// Picks the target contract out of raw standard-json compiler output.
///
/// The presence of the target is the only success signal; diagnostics from a
/// failed compilation are logged and replaced by [`Error::InvalidMetadata`].
pub fn extract(
    output: &str,
    file_name: &str,
    contract_name: &str,
    version: &CompilerVersion,
) -> Result<RecompilationResult, Error> {
    let output: CompilerOutput = serde_json::from_str(output)
        .context("compiler output is not valid json")
        .map_err(Error::Internal)?;

    let contract = output
        .contracts
        .as_ref()
        .and_then(|contracts| contracts.get(file_name))
        .and_then(|file| file.get(contract_name));
    let contract = match contract {
        Some(contract) => contract,
        None => {
            let errors: Vec<&str> = output
                .errors
                .iter()
                .filter(|diagnostic| diagnostic.is_error())
                .map(Diagnostic::text)
                .collect();
            tracing::error!(
                target: "recompiler",
                version = %version,
                file_name,
                contract_name,
                ?errors,
                "compiler output has no target contract"
            );
            return Err(Error::InvalidMetadata);
        }
    };

    let contract = ContractOutput::deserialize(contract)
        .context("malformed contract artifacts in compiler output")
        .map_err(Error::Internal)?;
    Ok(RecompilationResult {
        bytecode: format!("0x{}", contract.evm.bytecode.object),
        deployed_bytecode: format!("0x{}", contract.evm.deployed_bytecode.object),
        metadata: contract.metadata.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::str::FromStr;

    fn version() -> CompilerVersion {
        CompilerVersion::from_str("0.8.9+commit.e5eed63a").unwrap()
    }

    #[test]
    fn extracts_target_contract() {
        let output = json!({
            "contracts": {
                "A.sol": {
                    "A": {
                        "evm": {
                            "bytecode": {"object": "6001"},
                            "deployedBytecode": {"object": "6002"}
                        },
                        "metadata": "  {}  "
                    }
                }
            },
            "errors": [{"severity": "warning", "message": "unused variable"}]
        })
        .to_string();

        let result = extract(&output, "A.sol", "A", &version()).unwrap();
        assert_eq!(
            result,
            RecompilationResult {
                bytecode: "0x6001".to_string(),
                deployed_bytecode: "0x6002".to_string(),
                metadata: "{}".to_string(),
            }
        );
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"bytecode": "0x6001", "deployedBytecode": "0x6002", "metadata": "{}"})
        );
    }

    #[test]
    fn missing_contract_hides_diagnostics() {
        let diagnostic = "ParserError: Expected ';' but got '}' --> A.sol:3:1";
        let outputs = [
            json!({"errors": [{
                "severity": "error",
                "message": "Expected ';' but got '}'",
                "formattedMessage": diagnostic
            }]}),
            json!({"contracts": {"B.sol": {}}}),
            json!({"contracts": {"A.sol": {"B": {}}}}),
        ];

        for output in outputs {
            let err = extract(&output.to_string(), "A.sol", "A", &version())
                .expect_err("target contract is missing");
            assert!(matches!(err, Error::InvalidMetadata), "{err:?}");
            let message = err.to_string();
            assert!(message.contains("probably caused by invalid metadata"));
            assert!(!message.contains("Expected"), "{message}");
        }
    }

    #[test]
    fn target_wins_over_diagnostics() {
        let output = json!({
            "contracts": {
                "A.sol": {
                    "A": {
                        "evm": {
                            "bytecode": {"object": ""},
                            "deployedBytecode": {"object": ""}
                        },
                        "metadata": ""
                    }
                }
            },
            "errors": [{"severity": "error", "message": "something went wrong"}]
        })
        .to_string();

        let result = extract(&output, "A.sol", "A", &version()).unwrap();
        assert_eq!(result.bytecode, "0x");
    }

    #[test]
    fn malformed_diagnostics_do_not_hide_target() {
        let output = json!({
            "contracts": {
                "A.sol": {
                    "A": {
                        "evm": {
                            "bytecode": {"object": "6001"},
                            "deployedBytecode": {"object": "6002"}
                        },
                        "metadata": "{}"
                    }
                }
            },
            "errors": [{"message": "diagnostic without severity"}, {}]
        })
        .to_string();

        let result = extract(&output, "A.sol", "A", &version()).unwrap();
        assert_eq!(result.deployed_bytecode, "0x6002");
    }

    #[test]
    fn non_json_output_is_internal_error() {
        let err = extract("Segmentation fault", "A.sol", "A", &version())
            .expect_err("output is not json");
        assert!(matches!(err, Error::Internal(_)), "{err:?}");
    }
}
