//! Compiled contract artifacts.
//!
//! Artifacts are read from Foundry's output layout: `<out>/<File>.sol/<Contract>.json`.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Directory under `out/` that holds build-info files rather than contracts.
const BUILD_INFO_DIR: &str = "build-info";

/// Compiler output selection requested from the explorer's compiler.
const OUTPUT_SELECTION: &[&str] = &[
    "abi",
    "evm.bytecode",
    "evm.deployedBytecode",
    "evm.methodIdentifiers",
    "metadata",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    abi: JsonAbi,
    bytecode: RawBytecode,
    #[serde(default)]
    metadata: Option<ContractMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBytecode {
    object: String,
}

/// Solidity metadata embedded in the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub compiler: CompilerInfo,
    #[serde(default = "default_language")]
    pub language: String,
    pub settings: Map<String, Value>,
    pub sources: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInfo {
    /// Long compiler version, e.g. `0.8.20+commit.a1b79de6`.
    pub version: String,
}

fn default_language() -> String {
    "Solidity".to_string()
}

/// A compiled contract: the factory used to deploy it.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    /// Contract name.
    pub name: String,
    /// Path of the artifact file.
    pub path: PathBuf,
    /// Contract ABI.
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
    /// Compiler metadata, needed for source verification.
    pub metadata: Option<ContractMetadata>,
}

impl ContractArtifact {
    /// Find the artifact of a contract in the artifacts directory.
    ///
    /// `contract` is either a bare contract name or `File.sol:Contract` when the
    /// bare name is ambiguous.
    pub fn find(out_dir: &Path, contract: &str) -> Result<Self> {
        if let Some((file, name)) = contract.rsplit_once(':') {
            let file_name = Path::new(file)
                .file_name()
                .with_context(|| format!("Invalid contract source path: {}", file))?;
            let path = out_dir.join(file_name).join(format!("{}.json", name));
            return Self::load(&path, name);
        }

        let entries = std::fs::read_dir(out_dir).with_context(|| {
            format!(
                "Failed to read artifacts directory {} - has the project been compiled?",
                out_dir.display()
            )
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read artifacts directory entry")?;
            if !entry.file_type()?.is_dir() || entry.file_name() == BUILD_INFO_DIR {
                continue;
            }
            let candidate = entry.path().join(format!("{}.json", contract));
            if candidate.is_file() {
                candidates.push(candidate);
            }
        }
        candidates.sort();

        match candidates.as_slice() {
            [] => anyhow::bail!(
                "Artifact for contract '{}' not found in {}",
                contract,
                out_dir.display()
            ),
            [path] => Self::load(path, contract),
            paths => anyhow::bail!(
                "Contract name '{}' is ambiguous, use <File.sol>:{} instead. Candidates: {}",
                contract,
                contract,
                paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Load an artifact file.
    pub fn load(path: &Path, name: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let raw: RawArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let object = raw.bytecode.object.trim_start_matches("0x");
        if object.contains("__$") {
            anyhow::bail!(
                "Contract '{}' has unlinked library references and cannot be deployed as is",
                name
            );
        }
        if object.is_empty() {
            anyhow::bail!(
                "Contract '{}' has no creation bytecode (abstract contract or interface?)",
                name
            );
        }
        let bytecode = hex::decode(object)
            .with_context(|| format!("Invalid bytecode in artifact {}", path.display()))?;

        tracing::debug!(
            contract = name,
            path = %path.display(),
            bytecode_len = bytecode.len(),
            "Artifact loaded"
        );

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            abi: raw.abi,
            bytecode: bytecode.into(),
            metadata: raw.metadata,
        })
    }

    /// ABI-encode constructor arguments given as strings.
    ///
    /// Each argument is parsed as the type of the matching constructor input.
    pub fn encode_constructor_args(&self, args: &[String]) -> Result<Bytes> {
        let inputs = self
            .abi
            .constructor
            .as_ref()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default();

        if inputs.len() != args.len() {
            anyhow::bail!(
                "Contract '{}' expects {} constructor argument(s), got {}",
                self.name,
                inputs.len(),
                args.len()
            );
        }

        if inputs.is_empty() {
            return Ok(Bytes::new());
        }

        let values = inputs
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let ty: DynSolType = param
                    .resolve()
                    .with_context(|| format!("Unsupported constructor input type {}", param.ty))?;
                ty.coerce_str(arg).with_context(|| {
                    format!("Invalid value '{}' for constructor input {} {}", arg, ty, param.name)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DynSolValue::Tuple(values).abi_encode_params().into())
    }

    /// Creation code with the encoded constructor arguments appended.
    pub fn init_code(&self, encoded_args: &Bytes) -> Bytes {
        let mut code = self.bytecode.to_vec();
        code.extend_from_slice(encoded_args);
        code.into()
    }

    fn metadata(&self) -> Result<&ContractMetadata> {
        self.metadata.as_ref().with_context(|| {
            format!(
                "Artifact {} has no metadata, rebuild with metadata output enabled",
                self.path.display()
            )
        })
    }

    /// Compiler version the contract was built with.
    pub fn compiler_version(&self) -> Result<&str> {
        Ok(&self.metadata()?.compiler.version)
    }

    /// `<source path>:<contract name>`, as explorers expect it.
    pub fn fully_qualified_name(&self) -> Result<String> {
        let target = self
            .metadata()?
            .settings
            .get("compilationTarget")
            .and_then(Value::as_object)
            .and_then(|target| target.iter().next())
            .context("No compilation target in artifact metadata")?;

        let name = target.1.as_str().unwrap_or(&self.name);
        Ok(format!("{}:{}", target.0, name))
    }

    /// Build the standard-JSON compiler input for this contract.
    ///
    /// Source contents are read from `root`, using the paths recorded in the metadata.
    pub fn standard_json_input(&self, root: &Path) -> Result<Value> {
        let metadata = self.metadata()?;

        let mut sources = Map::new();
        for source_path in metadata.sources.keys() {
            let full_path = root.join(source_path);
            let content = std::fs::read_to_string(&full_path)
                .with_context(|| format!("Failed to read source {}", full_path.display()))?;
            sources.insert(source_path.clone(), serde_json::json!({ "content": content }));
        }

        let mut settings = metadata.settings.clone();
        settings.remove("compilationTarget");
        if let Some(libraries) = settings.remove("libraries") {
            settings.insert("libraries".to_string(), nest_libraries(&libraries)?);
        }
        settings.insert(
            "outputSelection".to_string(),
            serde_json::json!({ "*": { "*": OUTPUT_SELECTION, "": ["ast"] } }),
        );

        Ok(serde_json::json!({
            "language": metadata.language,
            "sources": sources,
            "settings": settings,
        }))
    }
}

/// Metadata lists libraries as `{"path:Name": address}`, standard JSON wants
/// `{"path": {"Name": address}}`.
fn nest_libraries(flat: &Value) -> Result<Value> {
    let flat = flat
        .as_object()
        .context("Artifact metadata libraries must be an object")?;

    let mut nested: Map<String, Value> = Map::new();
    for (key, address) in flat {
        let (path, name) = key
            .rsplit_once(':')
            .with_context(|| format!("Invalid library reference '{}'", key))?;
        let entry = nested
            .entry(path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(names) = entry {
            names.insert(name.to_string(), address.clone());
        }
    }

    Ok(Value::Object(nested))
}
