// On-chain interfaces of the diamond and the facets the scripts talk to.

use alloy::sol;

// EIP-2535 upgrade entry point. `action` is the FacetCutAction enum, which
// the ABI encodes as uint8.
sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct FacetCut {
        address facetAddress;
        uint8 action;
        bytes4[] functionSelectors;
    }

    #[derive(Debug)]
    function diamondCut(FacetCut[] _diamondCut, address _init, bytes _calldata) external;
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct Facet {
        address facetAddress;
        bytes4[] functionSelectors;
    }

    #[derive(Debug)]
    function facets() external view returns (Facet[] facets_);
    function facetFunctionSelectors(address _facet) external view returns (bytes4[] facetFunctionSelectors_);
    function facetAddresses() external view returns (address[] facetAddresses_);
    function facetAddress(bytes4 _functionSelector) external view returns (address facetAddress_);
    function supportsInterface(bytes4 _interfaceId) external view returns (bool);
}

sol! {
    interface IDiamondInit {
        function init() external;
    }

    interface IOwnership {
        function owner() external view returns (address owner_);
        function transferOwnership(address _newOwner) external;
    }

    interface ICounter {
        function getCount() external view returns (uint256);
        function increment() external;
        function decrement() external;
    }

    interface ICounterV2 {
        function isMultipleOf(uint256 divisor) external view returns (bool);
    }

    interface ICounterV3 {
        function initializeV3() external;
        function getCounterInfo() external view returns (
            uint256 value,
            uint256 lastIncremented,
            uint256 lastDecremented,
            uint256 totalIncrements,
            uint256 totalDecrements,
            address lastModifier
        );
        function getTotalIncrements() external view returns (uint256);
        function getLastModifier() external view returns (address);
    }

    interface IERC20Facet {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function mint(address to, uint256 amount) external;
    }

    interface ICalculator {
        function setValue(uint256 value) external;
        function add(uint256 value) external;
        function subtract(uint256 value) external;
        function multiply(uint256 value) external;
        function divide(uint256 value) external;
        function getResult() external view returns (uint256);
        function getOperationCount() external view returns (uint256);
        function getLastOperator() external view returns (address);
        function reset() external;
    }
}
