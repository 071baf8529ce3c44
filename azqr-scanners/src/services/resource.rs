//! Scanners that only contribute graph recommendations

use crate::base::BaseScanner;

/// Types covered by the orphaned-resource queries
pub const GENERIC_RESOURCE_TYPES: [&str; 3] = [
    "Microsoft.Compute/disks",
    "Microsoft.Network/networkInterfaces",
    "Microsoft.Network/publicIPAddresses",
];

pub const VIRTUAL_MACHINE_TYPE: &str = "Microsoft.Compute/virtualMachines";
pub const KUBERNETES_TYPE: &str = "Microsoft.ContainerService/managedClusters";

/// Always kept by the graph stage, whatever the resource counts say
pub fn resource_scanner() -> BaseScanner {
    BaseScanner::new(GENERIC_RESOURCE_TYPES)
}

pub fn vm_scanner() -> BaseScanner {
    BaseScanner::new([VIRTUAL_MACHINE_TYPE])
}

pub fn aks_scanner() -> BaseScanner {
    BaseScanner::new([KUBERNETES_TYPE])
}
