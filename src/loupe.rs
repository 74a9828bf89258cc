//! Read side of the diamond: which facet serves which selectors.

use alloy::primitives::{Address, FixedBytes, Selector};
use anyhow::Result;

use crate::chain::{read, ChainClient};
use crate::contracts::{
    facetAddressCall, facetAddressesCall, facetFunctionSelectorsCall, facetsCall, supportsInterfaceCall, Facet,
};

/// ERC-165 ids a freshly initialised diamond must report as supported.
pub const STANDARD_INTERFACES: [(&str, FixedBytes<4>); 3] = [
    ("ERC-165", FixedBytes([0x01, 0xff, 0xc9, 0xa7])),
    ("IDiamondCut", FixedBytes([0x1f, 0x93, 0x1c, 0x1c])),
    ("IDiamondLoupe", FixedBytes([0x48, 0xe2, 0xb0, 0x93])),
];

pub async fn facets<C: ChainClient>(chain: &C, diamond: Address) -> Result<Vec<Facet>> {
    Ok(read(chain, diamond, facetsCall {}).await?.facets_)
}

pub async fn facet_addresses<C: ChainClient>(chain: &C, diamond: Address) -> Result<Vec<Address>> {
    Ok(read(chain, diamond, facetAddressesCall {}).await?.facetAddresses_)
}

pub async fn facet_function_selectors<C: ChainClient>(
    chain: &C,
    diamond: Address,
    facet: Address,
) -> Result<Vec<Selector>> {
    let call = facetFunctionSelectorsCall { _facet: facet };
    Ok(read(chain, diamond, call).await?.facetFunctionSelectors_)
}

/// Facet registered for `selector`, or the zero address.
pub async fn facet_address<C: ChainClient>(
    chain: &C,
    diamond: Address,
    selector: Selector,
) -> Result<Address> {
    let call = facetAddressCall {
        _functionSelector: selector,
    };
    Ok(read(chain, diamond, call).await?.facetAddress_)
}

pub async fn supports_interface<C: ChainClient>(
    chain: &C,
    diamond: Address,
    interface_id: FixedBytes<4>,
) -> Result<bool> {
    let call = supportsInterfaceCall {
        _interfaceId: interface_id,
    };
    Ok(read(chain, diamond, call).await?._0)
}

/// Position of `facet_address` in a `facets()` result.
pub fn find_address_position_in_facets(facet_address: Address, facets: &[Facet]) -> Option<usize> {
    facets.iter().position(|f| f.facetAddress == facet_address)
}

/// Pairs each recorded `(name, address)` with its position in `facets`.
/// `None` means the diamond no longer routes anything to that deployment.
pub fn locate_recorded<'a>(
    recorded: &'a [(String, Address)],
    facets: &[Facet],
) -> Vec<(&'a str, Address, Option<usize>)> {
    recorded
        .iter()
        .map(|(name, address)| (name.as_str(), *address, find_address_position_in_facets(*address, facets)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::fake::FakeChain;
    use crate::selectors::selector_of;
    use alloy::sol_types::SolCall;

    fn facet(byte: u8, sigs: &[&str]) -> Facet {
        Facet {
            facetAddress: Address::repeat_byte(byte),
            functionSelectors: sigs.iter().map(|s| selector_of(s).unwrap()).collect(),
        }
    }

    #[test]
    fn test_find_address_position() {
        let list = vec![facet(1, &["a()"]), facet(2, &["b()"]), facet(3, &["c()"])];
        assert_eq!(find_address_position_in_facets(Address::repeat_byte(2), &list), Some(1));
        assert_eq!(find_address_position_in_facets(Address::repeat_byte(9), &list), None);
        assert_eq!(find_address_position_in_facets(Address::ZERO, &[]), None);
    }

    #[test]
    fn test_locate_recorded_flags_replaced_facets() {
        let list = vec![facet(1, &["a()"]), facet(3, &["c()"])];
        let recorded = vec![
            ("DiamondCutFacet".to_string(), Address::repeat_byte(1)),
            ("CounterFacet".to_string(), Address::repeat_byte(2)),
            ("CounterFacetV2".to_string(), Address::repeat_byte(3)),
        ];

        let located = locate_recorded(&recorded, &list);
        assert_eq!(
            located,
            vec![
                ("DiamondCutFacet", Address::repeat_byte(1), Some(0)),
                ("CounterFacet", Address::repeat_byte(2), None),
                ("CounterFacetV2", Address::repeat_byte(3), Some(1)),
            ]
        );
    }

    #[test]
    fn test_standard_interface_ids() {
        let ids: Vec<_> = STANDARD_INTERFACES.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids[0], selector_of("supportsInterface(bytes4)").unwrap());
        assert_eq!(ids[1], selector_of("diamondCut((address,uint8,bytes4[])[],address,bytes)").unwrap());

        let loupe = ["facets()", "facetFunctionSelectors(address)", "facetAddresses()", "facetAddress(bytes4)"]
            .iter()
            .map(|s| selector_of(s).unwrap())
            .fold(FixedBytes::<4>::ZERO, |acc, s| acc ^ s);
        assert_eq!(ids[2], loupe);
    }

    #[tokio::test]
    async fn test_supports_interface_decodes_bool() {
        let chain = FakeChain::default();
        chain.state.lock().unwrap().call_result = supportsInterfaceCall::abi_encode_returns(&(true,)).into();
        assert!(supports_interface(&chain, Address::repeat_byte(0xd1), STANDARD_INTERFACES[0].1)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_facets_decodes_loupe_answer() {
        let chain = FakeChain::default();
        let expected = vec![facet(1, &["diamondCut((address,uint8,bytes4[])[],address,bytes)"]), facet(2, &["getCount()", "increment()"])];
        chain.state.lock().unwrap().call_result = facetsCall::abi_encode_returns(&(expected.clone(),)).into();

        let got = facets(&chain, Address::repeat_byte(0xd1)).await.unwrap();
        assert_eq!(got, expected);
    }
}
