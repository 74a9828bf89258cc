//! Function selector bookkeeping for diamond cuts.
//!
//! A facet's ABI is reduced to an ordered [`SelectorSet`]; signature lists
//! are then resolved against that same ABI to narrow or trim the set before
//! it goes into a cut.

use alloy::json_abi::Function;
use alloy::primitives::Selector;
use serde_json::Value;
use std::fmt;
use tracing::warn;

use crate::error::SelectorError;

/// Name of the one-time initializer that is never registered on the diamond.
pub const INITIALIZER_NAME: &str = "init";

/// Callable functions of one contract, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetAbi {
    contract: String,
    functions: Vec<Function>,
}

impl FacetAbi {
    pub fn new(contract: impl Into<String>, functions: Vec<Function>) -> Self {
        Self {
            contract: contract.into(),
            functions,
        }
    }

    /// Builds an ABI from a JSON ABI array (the `abi` field of a build artifact).
    ///
    /// Only `function` fragments are kept. Entries without a `type` are treated
    /// as functions, which is what solc emitted before 0.5. A missing or empty
    /// array is [`SelectorError::MissingAbi`]; an array holding only a
    /// constructor or fallback is fine and yields no functions.
    pub fn from_json(contract: impl Into<String>, abi: &Value) -> Result<Self, SelectorError> {
        let contract = contract.into();
        if abi.is_null() {
            return Err(SelectorError::MissingAbi { contract });
        }

        let items: Vec<Value> =
            serde_json::from_value(abi.clone()).map_err(|source| SelectorError::MalformedAbi {
                contract: contract.clone(),
                source,
            })?;
        if items.is_empty() {
            return Err(SelectorError::MissingAbi { contract });
        }

        let mut functions = Vec::new();
        for mut item in items {
            let kind = item.get("type").and_then(Value::as_str).unwrap_or("function");
            if kind != "function" {
                continue;
            }
            if let Some(obj) = item.as_object_mut() {
                obj.entry("type").or_insert_with(|| Value::from("function"));
            }
            let function: Function =
                serde_json::from_value(item).map_err(|source| SelectorError::MalformedAbi {
                    contract: contract.clone(),
                    source,
                })?;
            functions.push(function);
        }

        Ok(Self {
            contract,
            functions,
        })
    }

    pub fn from_json_str(contract: impl Into<String>, json: &str) -> Result<Self, SelectorError> {
        let contract = contract.into();
        let value: Value =
            serde_json::from_str(json).map_err(|source| SelectorError::MalformedAbi {
                contract: contract.clone(),
                source,
            })?;
        Self::from_json(contract, &value)
    }

    /// Builds an ABI from human readable signatures such as `"transfer(address,uint256)"`.
    pub fn parse<I>(contract: impl Into<String>, signatures: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let functions = signatures
            .into_iter()
            .map(|sig| parse_function(sig.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(contract, functions))
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Resolves a full signature (`bar(uint256)`) or a bare, non-overloaded
    /// name (`bar`) to the matching function.
    pub fn resolve(&self, signature: &str) -> Result<&Function, SelectorError> {
        let wanted = strip_keyword(signature);

        if wanted.contains('(') {
            let canonical = parse_function(wanted)?.signature();
            return self
                .functions
                .iter()
                .find(|f| f.signature() == canonical)
                .ok_or_else(|| SelectorError::UnknownFunction {
                    contract: self.contract.clone(),
                    signature: signature.to_string(),
                });
        }

        let mut matches = self.functions.iter().filter(|f| f.name == wanted);
        match (matches.next(), matches.count()) {
            (Some(function), 0) => Ok(function),
            (Some(_), rest) => Err(SelectorError::AmbiguousFunction {
                contract: self.contract.clone(),
                name: wanted.to_string(),
                count: rest + 1,
            }),
            (None, _) => Err(SelectorError::UnknownFunction {
                contract: self.contract.clone(),
                signature: signature.to_string(),
            }),
        }
    }
}

/// Ordered selectors destined for one cut.
///
/// Construction keeps whatever it is given, repeats included.
/// [`derive_selectors`] never yields a repeat and [`crate::cut::build_cut`]
/// rejects one, so a set that reaches the chain is repeat-free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SelectorSet(Vec<Selector>);

impl SelectorSet {
    pub fn as_slice(&self) -> &[Selector] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.0.contains(selector)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Selector> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Selector> {
        self.0
    }
}

impl From<Vec<Selector>> for SelectorSet {
    fn from(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }
}

impl FromIterator<Selector> for SelectorSet {
    fn from_iter<T: IntoIterator<Item = Selector>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SelectorSet {
    type Item = &'a Selector;
    type IntoIter = std::slice::Iter<'a, Selector>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, selector) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{selector}")?;
        }
        f.write_str("]")
    }
}

/// A signature that could not be resolved and therefore filtered nothing.
#[derive(Debug)]
pub struct Skipped {
    pub signature: String,
    pub error: SelectorError,
}

/// Result of [`remove`] and [`get`]: the retained selectors plus every
/// signature that was skipped, so the caller can decide whether that matters.
#[derive(Debug)]
pub struct Filtered {
    pub selectors: SelectorSet,
    pub skipped: Vec<Skipped>,
}

impl Filtered {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Selectors of every function in `abi` except the initializer.
pub fn derive_selectors(abi: &FacetAbi) -> Result<SelectorSet, SelectorError> {
    let mut selectors: Vec<Selector> = Vec::with_capacity(abi.functions.len());
    for function in abi.functions.iter().filter(|f| f.name != INITIALIZER_NAME) {
        let selector = function.selector();
        if selectors.contains(&selector) {
            return Err(SelectorError::DuplicateSelector {
                contract: abi.contract.clone(),
                selector,
            });
        }
        selectors.push(selector);
    }
    Ok(SelectorSet(selectors))
}

/// Drops every selector named by `signatures`, keeping the rest in order.
pub fn remove<I>(set: &SelectorSet, abi: &FacetAbi, signatures: I) -> Filtered
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let (targets, skipped) = resolve_all(abi, signatures);
    Filtered {
        selectors: set.iter().filter(|s| !targets.contains(s)).copied().collect(),
        skipped,
    }
}

/// Keeps only the selectors named by `signatures`, in their original order.
pub fn get<I>(set: &SelectorSet, abi: &FacetAbi, signatures: I) -> Filtered
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let (targets, skipped) = resolve_all(abi, signatures);
    Filtered {
        selectors: set.iter().filter(|s| targets.contains(s)).copied().collect(),
        skipped,
    }
}

/// Subtracts raw signatures from `set` without needing the originating ABI.
pub fn remove_selectors_by_signature<I>(
    set: &SelectorSet,
    signatures: I,
) -> Result<SelectorSet, SelectorError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let targets = signatures
        .into_iter()
        .map(|sig| selector_of(sig.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(set.iter().filter(|s| !targets.contains(s)).copied().collect())
}

/// Selector of a single signature, with or without a leading `function` keyword.
pub fn selector_of(signature: &str) -> Result<Selector, SelectorError> {
    Ok(parse_function(signature)?.selector())
}

fn resolve_all<I>(abi: &FacetAbi, signatures: I) -> (Vec<Selector>, Vec<Skipped>)
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut targets = Vec::new();
    let mut skipped = Vec::new();
    for signature in signatures {
        let signature = signature.as_ref();
        match abi.resolve(signature) {
            Ok(function) => targets.push(function.selector()),
            Err(error) => {
                warn!(contract = abi.contract(), signature, %error, "⚠️ Function not found, skipping");
                skipped.push(Skipped {
                    signature: signature.to_string(),
                    error,
                });
            }
        }
    }
    (targets, skipped)
}

fn strip_keyword(signature: &str) -> &str {
    let trimmed = signature.trim();
    trimmed.strip_prefix("function ").unwrap_or(trimmed).trim()
}

fn parse_function(signature: &str) -> Result<Function, SelectorError> {
    Function::parse(strip_keyword(signature)).map_err(|e| SelectorError::InvalidSignature {
        signature: signature.to_string(),
        reason: e.to_string(),
    })
}
