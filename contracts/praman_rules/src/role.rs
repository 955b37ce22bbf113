//! Roles and the static permission table.

use core::fmt;
use core::str::FromStr;

/// A supply-chain participant role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RoleKind {
    Farmer,
    Collector,
    Lab,
    Supplier,
    Distributor,
    Retailer,
}

/// What a role is allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Permissions {
    /// May create genesis batches.
    pub can_originate: bool,
    /// May dispatch a held batch to another actor.
    pub can_send: bool,
    /// May accept a batch addressed to it.
    pub can_receive: bool,
    /// Roles this role may hand a batch to.
    pub next_roles: &'static [RoleKind],
}

/// Returned when a role name is not one of the six known roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownRole;

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown role")
    }
}

const FARMER: Permissions = Permissions {
    can_originate: true,
    can_send: true,
    can_receive: false,
    next_roles: &[RoleKind::Collector],
};

const COLLECTOR: Permissions = Permissions {
    can_originate: false,
    can_send: true,
    can_receive: true,
    next_roles: &[RoleKind::Lab, RoleKind::Supplier],
};

const LAB: Permissions = Permissions {
    can_originate: false,
    can_send: true,
    can_receive: true,
    next_roles: &[RoleKind::Supplier, RoleKind::Distributor],
};

const SUPPLIER: Permissions = Permissions {
    can_originate: false,
    can_send: true,
    can_receive: true,
    next_roles: &[RoleKind::Distributor],
};

const DISTRIBUTOR: Permissions = Permissions {
    can_originate: false,
    can_send: true,
    can_receive: true,
    next_roles: &[RoleKind::Retailer],
};

const RETAILER: Permissions = Permissions {
    can_originate: false,
    can_send: false,
    can_receive: true,
    next_roles: &[],
};

impl RoleKind {
    /// Every role, in supply-chain order.
    pub const ALL: [RoleKind; 6] = [
        RoleKind::Farmer,
        RoleKind::Collector,
        RoleKind::Lab,
        RoleKind::Supplier,
        RoleKind::Distributor,
        RoleKind::Retailer,
    ];

    pub const fn permissions(self) -> Permissions {
        match self {
            RoleKind::Farmer => FARMER,
            RoleKind::Collector => COLLECTOR,
            RoleKind::Lab => LAB,
            RoleKind::Supplier => SUPPLIER,
            RoleKind::Distributor => DISTRIBUTOR,
            RoleKind::Retailer => RETAILER,
        }
    }

    /// Whether a batch held by `self` may be sent to an actor holding `next`.
    ///
    /// Only the sender→recipient direction is checked.
    pub fn can_hand_off_to(self, next: RoleKind) -> bool {
        let permissions = self.permissions();
        permissions.can_send && permissions.next_roles.contains(&next)
    }

    /// A role with no onward hand-off is the end of the chain.
    pub const fn is_terminal(self) -> bool {
        self.permissions().next_roles.is_empty()
    }

    /// Three-letter prefix used when minting registration IDs.
    pub const fn prefix(self) -> &'static str {
        match self {
            RoleKind::Farmer => "FRM",
            RoleKind::Collector => "COL",
            RoleKind::Lab => "LAB",
            RoleKind::Supplier => "SUP",
            RoleKind::Distributor => "DIS",
            RoleKind::Retailer => "RET",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            RoleKind::Farmer => "farmer",
            RoleKind::Collector => "collector",
            RoleKind::Lab => "lab",
            RoleKind::Supplier => "supplier",
            RoleKind::Distributor => "distributor",
            RoleKind::Retailer => "retailer",
        }
    }

    /// Supply-chain stage label recorded on a batch once this role holds it.
    pub const fn stage_name(self) -> &'static str {
        match self {
            RoleKind::Farmer => "genesis",
            other => other.as_str(),
        }
    }
}

impl FromStr for RoleKind {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleKind::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(UnknownRole)
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
