//! Packet sequencing (§4.3, Annex A.6): enumerates `(layer, resolution,
//! component, precinct)` tuples in the order named by one of the five
//! legal progression orders (LRCP/RLCP/RPCL/PCRL/CPRL).
//!
//! A POC (progression order change) record narrows the loop to a
//! sub-range of resolutions/components/layers and may switch the
//! progression order partway through the tile; [`PacketSequencer`] applies
//! zero or more of these on top of the tile's default order.

use crate::coding_parameters::ProgressionOrderChange;
use crate::constants::progression;

/// One packet's coordinates within a tile-part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCoord {
    pub layer: u16,
    pub resolution: u8,
    pub component: u16,
    pub precinct: u32,
}

/// Generates the packet order for one tile, given how many precincts each
/// (component, resolution) pair contributes. `precinct_counts[comp][res]`
/// is the number of precincts in that component's resolution.
pub struct PacketSequencer<'a> {
    num_layers: u16,
    num_components: u16,
    num_resolutions: u8,
    precinct_counts: &'a [Vec<u32>],
}

impl<'a> PacketSequencer<'a> {
    pub fn new(num_layers: u16, num_components: u16, num_resolutions: u8, precinct_counts: &'a [Vec<u32>]) -> Self {
        Self {
            num_layers,
            num_components,
            num_resolutions,
            precinct_counts,
        }
    }

    fn precincts_in(&self, component: u16, resolution: u8) -> u32 {
        self.precinct_counts
            .get(component as usize)
            .and_then(|per_res| per_res.get(resolution as usize))
            .copied()
            .unwrap_or(1)
    }

    /// Full tile sequence for one progression order, ignoring any POC.
    pub fn sequence(&self, order: u8) -> Vec<PacketCoord> {
        self.sequence_range(order, 0, self.num_resolutions, 0, self.num_components, self.num_layers)
    }

    /// Sequence restricted to a POC sub-range (or the whole tile, when
    /// called with the tile's full extents).
    #[allow(clippy::too_many_arguments)]
    pub fn sequence_range(
        &self,
        order: u8,
        res_start: u8,
        res_end: u8,
        comp_start: u16,
        comp_end: u16,
        layer_end: u16,
    ) -> Vec<PacketCoord> {
        let mut out = Vec::new();
        let mut push = |layer, resolution, component| {
            for precinct in 0..self.precincts_in(component, resolution) {
                out.push(PacketCoord {
                    layer,
                    resolution,
                    component,
                    precinct,
                });
            }
        };

        match order {
            progression::LRCP => {
                for layer in 0..layer_end {
                    for resolution in res_start..res_end {
                        for component in comp_start..comp_end {
                            push(layer, resolution, component);
                        }
                    }
                }
            }
            progression::RLCP => {
                for resolution in res_start..res_end {
                    for layer in 0..layer_end {
                        for component in comp_start..comp_end {
                            push(layer, resolution, component);
                        }
                    }
                }
            }
            progression::RPCL => {
                for resolution in res_start..res_end {
                    let max_precincts = (comp_start..comp_end)
                        .map(|c| self.precincts_in(c, resolution))
                        .max()
                        .unwrap_or(0);
                    for precinct in 0..max_precincts {
                        for component in comp_start..comp_end {
                            if precinct >= self.precincts_in(component, resolution) {
                                continue;
                            }
                            for layer in 0..layer_end {
                                out.push(PacketCoord {
                                    layer,
                                    resolution,
                                    component,
                                    precinct,
                                });
                            }
                        }
                    }
                }
            }
            progression::PCRL => {
                let max_precincts = (res_start..res_end)
                    .flat_map(|r| (comp_start..comp_end).map(move |c| (c, r)))
                    .map(|(c, r)| self.precincts_in(c, r))
                    .max()
                    .unwrap_or(0);
                for precinct in 0..max_precincts {
                    for component in comp_start..comp_end {
                        for resolution in res_start..res_end {
                            if precinct >= self.precincts_in(component, resolution) {
                                continue;
                            }
                            for layer in 0..layer_end {
                                out.push(PacketCoord {
                                    layer,
                                    resolution,
                                    component,
                                    precinct,
                                });
                            }
                        }
                    }
                }
            }
            progression::CPRL => {
                for component in comp_start..comp_end {
                    let max_precincts = (res_start..res_end)
                        .map(|r| self.precincts_in(component, r))
                        .max()
                        .unwrap_or(0);
                    for precinct in 0..max_precincts {
                        for resolution in res_start..res_end {
                            if precinct >= self.precincts_in(component, resolution) {
                                continue;
                            }
                            for layer in 0..layer_end {
                                out.push(PacketCoord {
                                    layer,
                                    resolution,
                                    component,
                                    precinct,
                                });
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        out
    }

    /// Applies a tile's POC records in order, falling back to `default_order`
    /// for whatever range they don't cover is already handled by the caller
    /// constructing one `sequence_range` call per POC entry.
    pub fn sequence_with_poc(&self, default_order: u8, pocs: &[ProgressionOrderChange]) -> Vec<PacketCoord> {
        if pocs.is_empty() {
            return self.sequence(default_order);
        }
        let mut out = Vec::new();
        for poc in pocs {
            out.extend(self.sequence_range(
                poc.progression_order,
                poc.resolution_start,
                poc.resolution_end,
                poc.component_start,
                poc.component_end,
                poc.layer_end,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(comps: usize, resolutions: usize) -> Vec<Vec<u32>> {
        vec![vec![1u32; resolutions]; comps]
    }

    #[test]
    fn lrcp_iterates_layer_outermost() {
        let pc = counts(2, 2);
        let seq = PacketSequencer::new(2, 2, 2, &pc).sequence(progression::LRCP);
        assert_eq!(seq.len(), 2 * 2 * 2);
        assert_eq!(seq[0].layer, 0);
        assert_eq!(seq[4].layer, 1);
    }

    #[test]
    fn rlcp_iterates_resolution_outermost() {
        let pc = counts(2, 2);
        let seq = PacketSequencer::new(2, 2, 2, &pc).sequence(progression::RLCP);
        assert_eq!(seq[0].resolution, 0);
        assert_eq!(seq.last().unwrap().resolution, 1);
    }

    #[test]
    fn cprl_iterates_component_outermost() {
        let pc = counts(2, 1);
        let seq = PacketSequencer::new(1, 2, 1, &pc).sequence(progression::CPRL);
        assert_eq!(seq[0].component, 0);
        assert_eq!(seq.last().unwrap().component, 1);
    }

    #[test]
    fn precinct_counts_gate_emitted_packets() {
        let pc = vec![vec![2u32]];
        let seq = PacketSequencer::new(1, 1, 1, &pc).sequence(progression::LRCP);
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[1].precinct, 1);
    }
}
