//! Diamond cut records and the batch that carries them to `diamondCut`.

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use std::fmt;

use crate::contracts;
use crate::error::CutError;
use crate::selectors::SelectorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FacetCutAction {
    Add = 0,
    Replace = 1,
    Remove = 2,
}

/// One validated `{facetAddress, action, functionSelectors}` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCut {
    facet_address: Address,
    action: FacetCutAction,
    selectors: SelectorSet,
}

impl FacetCut {
    pub fn facet_address(&self) -> Address {
        self.facet_address
    }

    pub fn action(&self) -> FacetCutAction {
        self.action
    }

    pub fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }

    fn to_sol(&self) -> contracts::FacetCut {
        contracts::FacetCut {
            facetAddress: self.facet_address,
            action: self.action as u8,
            functionSelectors: self.selectors.as_slice().to_vec(),
        }
    }
}

impl fmt::Display for FacetCut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} -> {}",
            self.action, self.facet_address, self.selectors
        )
    }
}

/// Builds a cut, rejecting records the diamond would revert on.
///
/// Remove must point at the zero address, Add and Replace at a real facet.
pub fn build_cut(
    facet_address: Address,
    action: FacetCutAction,
    selectors: SelectorSet,
) -> Result<FacetCut, CutError> {
    match action {
        FacetCutAction::Remove if !facet_address.is_zero() => {
            return Err(CutError::RemoveWithFacetAddress {
                address: facet_address,
            });
        }
        FacetCutAction::Add | FacetCutAction::Replace if facet_address.is_zero() => {
            return Err(CutError::MissingFacetAddress { action });
        }
        _ => {}
    }

    if selectors.is_empty() {
        return Err(CutError::EmptySelectors { action });
    }

    for (i, selector) in selectors.iter().enumerate() {
        if selectors.as_slice()[..i].contains(selector) {
            return Err(CutError::DuplicateSelector {
                action,
                selector: *selector,
            });
        }
    }

    Ok(FacetCut {
        facet_address,
        action,
        selectors,
    })
}

pub fn add(facet_address: Address, selectors: SelectorSet) -> Result<FacetCut, CutError> {
    build_cut(facet_address, FacetCutAction::Add, selectors)
}

pub fn replace(facet_address: Address, selectors: SelectorSet) -> Result<FacetCut, CutError> {
    build_cut(facet_address, FacetCutAction::Replace, selectors)
}

pub fn remove(selectors: SelectorSet) -> Result<FacetCut, CutError> {
    build_cut(Address::ZERO, FacetCutAction::Remove, selectors)
}

/// Contract and calldata executed by the diamond right after the cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initializer {
    pub address: Address,
    pub calldata: Bytes,
}

/// Cuts applied in one transaction, in order. The diamond processes them
/// sequentially, so a later cut may touch selectors an earlier one changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutBatch(Vec<FacetCut>);

pub fn build_batch(cuts: impl IntoIterator<Item = FacetCut>) -> CutBatch {
    CutBatch(cuts.into_iter().collect())
}

impl CutBatch {
    pub fn cuts(&self) -> &[FacetCut] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, cut: FacetCut) {
        self.0.push(cut);
    }

    /// Calldata for `diamondCut(cuts, init, calldata)`. Without an
    /// initializer the zero address and empty calldata are sent.
    pub fn encode(&self, init: Option<&Initializer>) -> Bytes {
        let (init_address, init_calldata) = match init {
            Some(init) => (init.address, init.calldata.clone()),
            None => (Address::ZERO, Bytes::new()),
        };
        let call = contracts::diamondCutCall {
            _diamondCut: self.0.iter().map(FacetCut::to_sol).collect(),
            _init: init_address,
            _calldata: init_calldata,
        };
        call.abi_encode().into()
    }
}
