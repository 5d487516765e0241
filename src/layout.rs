//! Lattice Layout
//!
//! Coordinates of a rotated planar surface code on the square lattice.
//! Data qubits sit on odd sites `(2i+1, 2j+1)` and check qubits on even sites `(2i, 2j)`.
//! The checkerboard parity of an even site decides whether it hosts an X-type or a Z-type check;
//! the top and bottom edges keep only X-type checks and the left and right edges keep only Z-type checks.
//!
//! Everything here is a pure function of the distance: list order and qubit indices are identical on every call,
//! which is required because detector offsets and the logical observable are derived from list order.
//!

use super::util::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// the four diagonal neighbors of a check qubit, in the canonical order used by orientation indices
pub const ADJACENT_STEPS: [(f64, f64); 4] = [(1., 1.), (-1., 1.), (1., -1.), (-1., -1.)];

/// immutable qubit layout of one circuit build
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    /// code distance
    pub distance: usize,
    /// data qubits in row-major order
    pub datas: Vec<Coordinate>,
    /// X-type check qubits in row-major order
    pub x_measures: Vec<Coordinate>,
    /// Z-type check qubits in row-major order
    pub z_measures: Vec<Coordinate>,
    /// bijection from every coordinate above to its qubit index
    #[serde(skip)]
    pub coord_to_index: BTreeMap<Coordinate, QubitIndex>,
}

impl Layout {
    pub fn new(distance: usize) -> Result<Self, StemError> {
        if distance == 0 {
            return Err(StemError::InvalidParameter("distance must be a positive integer".to_string()));
        }
        let mut datas = Vec::with_capacity(distance * distance);
        for j in 0..distance {
            for i in 0..distance {
                datas.push(Coordinate::new((2 * i + 1) as f64, (2 * j + 1) as f64));
            }
        }
        let mut x_measures = Vec::new();
        let mut z_measures = Vec::new();
        for j in 0..=distance {
            for i in 0..=distance {
                let on_horizontal_edge = j == 0 || j == distance;
                let on_vertical_edge = i == 0 || i == distance;
                if on_horizontal_edge && on_vertical_edge {
                    continue; // corners host no check
                }
                let coordinate = Coordinate::new((2 * i) as f64, (2 * j) as f64);
                let is_x_type = (i + j) % 2 == 0;
                if is_x_type && !on_vertical_edge {
                    x_measures.push(coordinate);
                } else if !is_x_type && !on_horizontal_edge {
                    z_measures.push(coordinate);
                }
            }
        }
        let mut coord_to_index = BTreeMap::new();
        for coordinate in datas.iter().chain(x_measures.iter()).chain(z_measures.iter()) {
            coord_to_index.insert(*coordinate, 0);
        }
        // index in row-major order over the whole lattice
        for (index, value) in coord_to_index.values_mut().enumerate() {
            *value = index as QubitIndex;
        }
        Ok(Self {
            distance,
            datas,
            x_measures,
            z_measures,
            coord_to_index,
        })
    }

    pub fn qubit_num(&self) -> usize {
        self.coord_to_index.len()
    }

    /// X-type checks followed by Z-type checks, the order in which checks are measured
    pub fn measures(&self) -> Vec<Coordinate> {
        self.x_measures.iter().chain(self.z_measures.iter()).copied().collect()
    }

    pub fn check_num(&self) -> usize {
        self.x_measures.len() + self.z_measures.len()
    }

    pub fn index_of(&self, coordinate: &Coordinate) -> Option<QubitIndex> {
        self.coord_to_index.get(coordinate).copied()
    }

    /// qubit indices of the given coordinates; every coordinate must come from this layout
    pub fn indices_of(&self, coordinates: &[Coordinate]) -> Vec<QubitIndex> {
        coordinates
            .iter()
            .map(|coordinate| self.index_of(coordinate).expect("coordinate does not belong to this layout"))
            .collect()
    }

    /// reverse map used to declare qubit positions
    pub fn index_to_coord(&self) -> BTreeMap<QubitIndex, Coordinate> {
        self.coord_to_index.iter().map(|(coordinate, index)| (*index, *coordinate)).collect()
    }

    /// the four candidate neighbors of a site, in the order of `reorder` (canonical when `None`)
    pub fn adjacent_coords(coordinate: &Coordinate, reorder: Option<&[usize; 4]>) -> [Coordinate; 4] {
        let canonical = ADJACENT_STEPS.map(|(dx, dy)| coordinate.offset(dx, dy));
        match reorder {
            Some(reorder) => reorder.map(|direction| canonical[direction]),
            None => canonical,
        }
    }

    /// the neighbor in direction `orientation`, or `None` when it falls outside the lattice
    pub fn neighbor(&self, coordinate: &Coordinate, orientation: usize, reorder: Option<&[usize; 4]>) -> Option<QubitIndex> {
        let adjacent = Self::adjacent_coords(coordinate, reorder);
        adjacent.get(orientation).and_then(|neighbor| self.index_of(neighbor))
    }

    /// JSON description of the layout, including the qubit index of each site
    pub fn snapshot(&self) -> serde_json::Value {
        let qubits: Vec<serde_json::Value> = self
            .coord_to_index
            .iter()
            .map(|(coordinate, index)| {
                let role = if self.x_measures.contains(coordinate) {
                    "x_measure"
                } else if self.z_measures.contains(coordinate) {
                    "z_measure"
                } else {
                    "data"
                };
                json!({
                    "index": index,
                    "x": coordinate.x,
                    "y": coordinate.y,
                    "role": role,
                })
            })
            .collect();
        json!({
            "distance": self.distance,
            "data_num": self.datas.len(),
            "x_measure_num": self.x_measures.len(),
            "z_measure_num": self.z_measures.len(),
            "qubits": qubits,
        })
    }
}
