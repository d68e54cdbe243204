// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graph recalculation: connected components, driver election, fan-in
//! computation and target-list migration.
//!
//! `recalc_graph` is the single entry point, re-run whenever topology,
//! activation or driver assignment changes. The computed target lists are
//! marshalled to the data loop through the invoke queue; staged `required`
//! values take effect at the next cycle reset.

use crate::context::Context;
use crate::rt::{InvokeOp, RtTarget};
use std::collections::{HashMap, HashSet, VecDeque};
use weft_core::{Clock, GraphEvent, LinkState, NodeId};

/// Everything recalculation decides for one node, applied in a second
/// pass.
struct Assignment {
    node: NodeId,
    driver: NodeId,
    is_driver: bool,
    scheduled: bool,
    required: i32,
    targets: Vec<NodeId>,
    followers: Vec<NodeId>,
}

impl<C: Clock + 'static> Context<C> {
    /// Recompute drivers, fan-in counts and target lists for the whole
    /// graph.
    pub fn recalc_graph(&mut self) {
        let assignments = self.plan_assignments();
        let drivers = assignments.iter().filter(|a| a.is_driver && a.scheduled).count() as u32;

        // Apply bookkeeping on the main-thread side.
        let mut driver_events = Vec::new();
        for assignment in &assignments {
            if let Some(node) = self.nodes.get_mut(&assignment.node) {
                if node.driver != assignment.driver {
                    node.driver = assignment.driver;
                    driver_events.push(GraphEvent::NodeDriverChanged {
                        id: assignment.node,
                        driver: assignment.driver,
                    });
                }
                node.followers = assignment.followers.clone();
                node.activation.state().set_required(assignment.required);
            }
        }
        for event in driver_events {
            let id = event.node_id().unwrap_or(NodeId::new(0));
            self.emit_node_event(id, event);
        }

        // Migrate the realtime side.
        for assignment in &assignments {
            let targets: Vec<RtTarget> = assignment
                .targets
                .iter()
                .filter_map(|id| {
                    self.nodes.get(id).map(|n| RtTarget {
                        node: *id,
                        activation: std::sync::Arc::clone(&n.activation),
                        signal: n.signal.clone(),
                    })
                })
                .collect();
            let mixes = self
                .nodes
                .get(&assignment.node)
                .map(|n| {
                    n.input_ports
                        .values()
                        .filter_map(|p| p.make_mix())
                        .map(|m| Box::new(m) as Box<dyn weft_backend::Processor>)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            self.loop_handle.invoke(InvokeOp::SetDriver {
                id: assignment.node,
                is_driver: assignment.is_driver && assignment.scheduled,
            });
            self.loop_handle
                .invoke(InvokeOp::SetTargets { id: assignment.node, targets });
            self.loop_handle
                .invoke(InvokeOp::SetMixes { id: assignment.node, mixes });
        }

        self.emit_global(GraphEvent::GraphRecalculated { drivers });
    }

    fn plan_assignments(&self) -> Vec<Assignment> {
        // Registration order (registry order) drives both iteration and
        // election tie-breaks.
        let registered: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.registered)
            .map(|n| n.id)
            .collect();

        // Undirected adjacency: data links plus forced-driver edges, so a
        // manual driver assignment pulls the node into its driver's
        // component.
        let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for link in self.links.values() {
            adjacency.entry(link.out_node).or_default().push(link.in_node);
            adjacency.entry(link.in_node).or_default().push(link.out_node);
        }
        for node in self.nodes.values() {
            if let Some(forced) = node.forced_driver {
                adjacency.entry(node.id).or_default().push(forced);
                adjacency.entry(forced).or_default().push(node.id);
            }
        }

        let mut assignments = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        for &start in &registered {
            if visited.contains(&start) {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            visited.insert(start);
            while let Some(current) = queue.pop_front() {
                component.push(current);
                for &next in adjacency.get(&current).into_iter().flatten() {
                    let known = self.nodes.get(&next).map(|n| n.registered).unwrap_or(false);
                    if known && visited.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            component.sort();
            self.plan_component(&component, &mut assignments);
        }
        assignments
    }

    fn plan_component(&self, component: &[NodeId], assignments: &mut Vec<Assignment>) {
        // A manual assignment to a driver-capable member wins; otherwise
        // the first driver-capable member by registration order.
        let forced = component
            .iter()
            .filter_map(|id| self.nodes.get(id).and_then(|n| n.forced_driver))
            .filter(|driver| {
                component.contains(driver)
                    && self.nodes.get(driver).map(|n| n.props.is_driver()).unwrap_or(false)
            })
            .min();
        let elected = forced.or_else(|| {
            component
                .iter()
                .copied()
                .find(|id| self.nodes.get(id).map(|n| n.props.is_driver()).unwrap_or(false))
        });

        let Some(driver) = elected else {
            // Leaderless component: nobody is scheduled.
            for &id in component {
                assignments.push(Assignment {
                    node: id,
                    driver: id,
                    is_driver: false,
                    scheduled: false,
                    required: 0,
                    targets: Vec::new(),
                    followers: Vec::new(),
                });
            }
            return;
        };

        let participants: HashSet<NodeId> = component
            .iter()
            .copied()
            .filter(|id| {
                self.nodes
                    .get(id)
                    .map(|n| n.active || n.props.always_process())
                    .unwrap_or(false)
            })
            .collect();
        // No cycles run while the driver itself is inactive.
        let scheduled = participants.contains(&driver);

        let mut followers: Vec<NodeId> = participants
            .iter()
            .copied()
            .filter(|id| *id != driver)
            .collect();
        followers.sort();

        for &id in component {
            if !scheduled || !participants.contains(&id) {
                assignments.push(Assignment {
                    node: id,
                    driver,
                    is_driver: id == driver,
                    scheduled: false,
                    required: 0,
                    targets: Vec::new(),
                    followers: Vec::new(),
                });
                continue;
            }

            if id == driver {
                // The driver's list holds every participant, itself
                // included; its own wave decrement plus one decrement per
                // finishing follower complete the cycle.
                let mut targets: Vec<NodeId> = participants.iter().copied().collect();
                targets.sort();
                assignments.push(Assignment {
                    node: id,
                    driver,
                    is_driver: true,
                    scheduled: true,
                    required: 1 + followers.len() as i32,
                    targets,
                    followers: followers.clone(),
                });
            } else {
                // Fan-in: the driver's kick plus each distinct upstream
                // participant. Downstream targets plus the driver entry,
                // deduplicated, form the node's own list.
                let mut sources: HashSet<NodeId> = HashSet::from([driver]);
                let mut sinks: HashSet<NodeId> = HashSet::from([driver]);
                for link in self.links.values() {
                    if link.state != LinkState::Active {
                        continue;
                    }
                    if link.in_node == id && participants.contains(&link.out_node) {
                        sources.insert(link.out_node);
                    }
                    if link.out_node == id && participants.contains(&link.in_node) {
                        sinks.insert(link.in_node);
                    }
                }
                let mut targets: Vec<NodeId> = sinks.into_iter().collect();
                targets.sort();
                assignments.push(Assignment {
                    node: id,
                    driver,
                    is_driver: false,
                    scheduled: true,
                    required: sources.len() as i32,
                    targets,
                    followers: Vec::new(),
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
