//! Resolves negated network sets into address space complements

use cidr::{IpCidr, Ipv4Cidr, Ipv6Cidr};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::bad_internal;
use crate::utils::ApiError;

/// A CIDR as integer math for either family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    /// The first address in this block shifted into the low bits
    addr: u128,
    /// The prefix length of this block
    len: u8,
    /// The address width of this family (32 or 128)
    bits: u8,
}

impl Block {
    /// The last address in this block
    fn last(&self) -> u128 {
        let host_bits = self.bits - self.len;
        if host_bits == 0 {
            self.addr
        } else {
            self.addr | (u128::MAX >> (128 - u32::from(host_bits)))
        }
    }

    /// Whether another block falls entirely inside this one
    fn contains(&self, other: &Block) -> bool {
        self.bits == other.bits && self.addr <= other.addr && other.last() <= self.last()
    }
}

/// Convert a CIDR into integer math
fn to_block(cidr: &IpCidr) -> Block {
    match cidr {
        IpCidr::V4(v4) => Block {
            addr: u128::from(u32::from(v4.first_address())),
            len: v4.network_length(),
            bits: 32,
        },
        IpCidr::V6(v6) => Block {
            addr: u128::from(v6.first_address()),
            len: v6.network_length(),
            bits: 128,
        },
    }
}

/// Convert integer math back into a CIDR
fn to_cidr(block: Block) -> Result<IpCidr, ApiError> {
    let cidr = if block.bits == 32 {
        IpCidr::V4(
            Ipv4Cidr::new(Ipv4Addr::from(block.addr as u32), block.len)
                .map_err(|err| bad_internal!(format!("invalid cidr split: {err}")))?,
        )
    } else {
        IpCidr::V6(
            Ipv6Cidr::new(Ipv6Addr::from(block.addr), block.len)
                .map_err(|err| bad_internal!(format!("invalid cidr split: {err}")))?,
        )
    };
    Ok(cidr)
}

/// Carve one excluded block out of a covering block
///
/// Splits the covering block in half repeatedly, keeping the half that does
/// not contain the exclusion, until only the exclusion is left out. This
/// yields the minimum set of non overlapping subnets.
fn carve(net: Block, exclude: Block) -> Vec<Block> {
    // excluding the whole block leaves nothing
    if net == exclude {
        return Vec::new();
    }
    let child_len = net.len + 1;
    let step = 1u128 << (net.bits - child_len);
    let lower = Block {
        addr: net.addr,
        len: child_len,
        bits: net.bits,
    };
    let upper = Block {
        addr: net.addr + step,
        len: child_len,
        bits: net.bits,
    };
    // recurse into the half holding the exclusion and keep the other
    let mut remaining = if lower.contains(&exclude) {
        let mut out = carve(lower, exclude);
        out.push(upper);
        out
    } else {
        let mut out = carve(upper, exclude);
        out.push(lower);
        out
    };
    remaining.sort_by_key(|block| (block.addr, block.len));
    remaining
}

/// Compute the address space complement of a set of networks
///
/// The IPv4 whole space root is only included when an IPv4 network is
/// excluded and likewise for IPv6, so each family is handled independently.
///
/// # Arguments
///
/// * `excluded` - The networks to carve out of the address space
pub fn complement(excluded: &[IpCidr]) -> Result<Vec<IpCidr>, ApiError> {
    let mut roots = Vec::with_capacity(2);
    // only include a whole space root for families that appear
    if excluded.iter().any(|cidr| cidr.is_ipv4()) {
        roots.push(Block {
            addr: 0,
            len: 0,
            bits: 32,
        });
    }
    if excluded.iter().any(|cidr| cidr.is_ipv6()) {
        roots.push(Block {
            addr: 0,
            len: 0,
            bits: 128,
        });
    }
    let mut flat = Vec::new();
    for root in roots {
        let mut remaining = vec![root];
        for exclude in excluded {
            let exclude = to_block(exclude);
            // skip exclusions from the other family
            if exclude.bits != root.bits {
                continue;
            }
            let mut next = Vec::with_capacity(remaining.len());
            for net in remaining {
                if net.contains(&exclude) {
                    next.extend(carve(net, exclude));
                } else {
                    next.push(net);
                }
            }
            remaining = next;
        }
        remaining.sort_by_key(|block| (block.addr, block.len));
        flat.extend(remaining);
    }
    flat.into_iter().map(to_cidr).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// parse a list of CIDRs for tests
    fn cidrs(raw: &[&str]) -> Vec<IpCidr> {
        raw.iter().map(|net| IpCidr::from_str(net).unwrap()).collect()
    }

    /// the number of addresses covered by a v4 cidr
    fn v4_size(cidr: &IpCidr) -> u64 {
        match cidr {
            IpCidr::V4(v4) => 1u64 << (32 - v4.network_length()),
            IpCidr::V6(_) => panic!("expected a v4 cidr"),
        }
    }

    #[test]
    fn complement_of_a_slash_eight() {
        let result = complement(&cidrs(&["10.0.0.0/8"])).unwrap();
        // the complement must not overlap the exclusion
        let excluded = IpCidr::from_str("10.0.0.0/8").unwrap();
        assert!(!result.contains(&excluded));
        assert!(result.contains(&IpCidr::from_str("11.0.0.0/8").unwrap()));
        assert!(result.contains(&IpCidr::from_str("0.0.0.0/5").unwrap()));
        assert!(result.contains(&IpCidr::from_str("128.0.0.0/1").unwrap()));
        // the complement plus the exclusion covers all of v4
        let total: u64 = result.iter().map(v4_size).sum::<u64>() + v4_size(&excluded);
        assert_eq!(total, 1u64 << 32);
    }

    #[test]
    fn disjoint_exclusions_rebuild_the_whole_space() {
        let excluded = cidrs(&["10.0.0.0/8", "192.168.0.0/16", "0.0.0.0/8"]);
        let result = complement(&excluded).unwrap();
        let total: u64 =
            result.iter().map(v4_size).sum::<u64>() + excluded.iter().map(v4_size).sum::<u64>();
        assert_eq!(total, 1u64 << 32);
        // no block overlaps any exclusion
        for block in &result {
            for exclude in &excluded {
                let (block, exclude) = (to_block(block), to_block(exclude));
                assert!(block.last() < exclude.addr || exclude.last() < block.addr);
            }
        }
    }

    #[test]
    fn families_are_handled_independently() {
        let result = complement(&cidrs(&["10.0.0.0/8", "2001:db8::/32"])).unwrap();
        assert!(result.iter().any(|cidr| cidr.is_ipv4()));
        assert!(result.iter().any(|cidr| cidr.is_ipv6()));
        // v4 only exclusions never produce a v6 root
        let v4_only = complement(&cidrs(&["10.0.0.0/8"])).unwrap();
        assert!(v4_only.iter().all(|cidr| cidr.is_ipv4()));
    }

    #[test]
    fn excluding_the_whole_space_leaves_nothing() {
        let result = complement(&cidrs(&["0.0.0.0/0"])).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn empty_exclusions_have_no_roots() {
        let result = complement(&[]).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn v6_complement_covers_the_space() {
        let result = complement(&cidrs(&["::/1"])).unwrap();
        assert_eq!(result, cidrs(&["8000::/1"]));
    }
}
