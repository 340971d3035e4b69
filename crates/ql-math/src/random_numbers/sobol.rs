//! Sobol low-discrepancy sequences with Gray-code ordering and Joe-Kuo
//! initialisation numbers.

use ql_core::{ensure, Real, Result};

// (degree, interior polynomial coefficients, initial direction numbers),
// S. Joe and F. Y. Kuo (2008); dimension 0 is van der Corput.
const JOE_KUO: &[(usize, u32, &[u32])] = &[
    (1, 0, &[1]),                             // dim 1
    (2, 1, &[1, 1]),                          // dim 2
    (3, 1, &[1, 1, 1]),                       // dim 3
    (3, 2, &[1, 3, 1]),                       // dim 4
    (4, 1, &[1, 1, 1, 1]),                    // dim 5
    (4, 4, &[1, 3, 3, 1]),                    // dim 6
    (5, 2, &[1, 1, 1, 3, 3]),                 // dim 7
    (5, 4, &[1, 3, 5, 13, 7]),                // dim 8
    (5, 7, &[1, 1, 5, 5, 15]),                // dim 9
    (5, 11, &[1, 3, 1, 7, 9]),                // dim 10
    (5, 13, &[1, 1, 3, 1, 13]),               // dim 11
    (5, 14, &[1, 1, 7, 13, 25]),              // dim 12
    (6, 1, &[1, 3, 7, 5, 29, 17]),            // dim 13
    (6, 13, &[1, 1, 5, 9, 5, 57]),            // dim 14
    (6, 16, &[1, 3, 1, 13, 25, 49]),          // dim 15
    (6, 19, &[1, 1, 3, 7, 17, 23]),           // dim 16
    (6, 22, &[1, 3, 5, 1, 15, 13]),           // dim 17
    (6, 25, &[1, 1, 1, 15, 7, 61]),           // dim 18
    (7, 1, &[1, 3, 1, 3, 5, 43, 79]),         // dim 19
    (7, 4, &[1, 1, 7, 5, 1, 35, 65]),         // dim 20
    (7, 7, &[1, 3, 3, 9, 31, 47, 3]),         // dim 21
    (7, 8, &[1, 1, 5, 7, 11, 15, 93]),        // dim 22
    (7, 14, &[1, 3, 7, 11, 17, 63, 111]),     // dim 23
    (7, 19, &[1, 1, 3, 3, 19, 37, 53]),       // dim 24
    (7, 21, &[1, 3, 1, 5, 5, 55, 99]),        // dim 25
    (7, 28, &[1, 1, 7, 15, 29, 7, 73]),       // dim 26
    (7, 31, &[1, 3, 5, 3, 29, 23, 83]),       // dim 27
    (7, 32, &[1, 1, 1, 9, 15, 39, 13]),       // dim 28
    (7, 37, &[1, 3, 3, 5, 9, 45, 117]),       // dim 29
    (7, 41, &[1, 1, 5, 13, 7, 25, 91]),       // dim 30
    (7, 42, &[1, 3, 7, 1, 19, 51, 97]),       // dim 31
    (7, 50, &[1, 1, 3, 11, 5, 41, 109]),      // dim 32
    (7, 55, &[1, 3, 1, 7, 27, 11, 63]),       // dim 33
    (7, 56, &[1, 1, 7, 3, 21, 33, 75]),       // dim 34
    (7, 59, &[1, 3, 5, 15, 31, 5, 49]),       // dim 35
    (7, 62, &[1, 1, 1, 1, 23, 57, 15]),       // dim 36
    (8, 14, &[1, 3, 3, 13, 3, 19, 111, 235]), // dim 37
    (8, 21, &[1, 1, 5, 1, 13, 41, 49, 237]),  // dim 38
    (8, 22, &[1, 3, 7, 7, 17, 27, 91, 157]),  // dim 39
    (8, 38, &[1, 1, 3, 9, 1, 53, 55, 69]),    // dim 40
    (8, 47, &[1, 3, 1, 3, 19, 21, 77, 193]),  // dim 41
    (8, 49, &[1, 1, 7, 11, 31, 17, 113, 43]), // dim 42
    (8, 50, &[1, 3, 5, 5, 5, 63, 19, 213]),   // dim 43
    (8, 52, &[1, 1, 1, 7, 21, 45, 5, 251]),   // dim 44
    (8, 56, &[1, 3, 3, 3, 27, 29, 97, 7]),    // dim 45
    (8, 67, &[1, 1, 5, 15, 7, 7, 43, 195]),   // dim 46
    (8, 69, &[1, 3, 7, 9, 29, 35, 79, 35]),   // dim 47
    (8, 70, &[1, 1, 3, 5, 15, 59, 23, 59]),   // dim 48
    (8, 84, &[1, 3, 1, 11, 1, 25, 121, 85]),  // dim 49
    (8, 87, &[1, 1, 7, 1, 19, 3, 103, 101]),  // dim 50
];

const BITS: usize = 32;
const NORMALIZER: Real = 4_294_967_296.0; // 2^32

/// Largest supported dimension.
pub const MAX_DIMENSION: usize = JOE_KUO.len() + 1;

/// Sobol sequence generator on `[0, 1)^d`.
#[derive(Debug, Clone)]
pub struct SobolRsg {
    count: u64,
    state: Vec<u32>,
    directions: Vec<[u32; BITS]>,
    point: Vec<Real>,
}

impl SobolRsg {
    /// Generator of the given dimension, skipping the first `skip` points.
    pub fn new(dimension: usize, skip: u64) -> Result<Self> {
        ensure!(
            (1..=MAX_DIMENSION).contains(&dimension),
            "Sobol dimension must be in [1, {MAX_DIMENSION}], got {dimension}"
        );
        let mut directions = Vec::with_capacity(dimension);
        let mut vdc = [0u32; BITS];
        for (i, v) in vdc.iter_mut().enumerate() {
            *v = 1 << (BITS - 1 - i);
        }
        directions.push(vdc);
        for &(degree, poly, init) in JOE_KUO.iter().take(dimension - 1) {
            let mut v = [0u32; BITS];
            for (i, &m) in init.iter().enumerate() {
                v[i] = m << (BITS - 1 - i);
            }
            for i in degree..BITS {
                v[i] = v[i - degree] ^ (v[i - degree] >> degree);
                for k in 1..degree {
                    if (poly >> (degree - 1 - k)) & 1 == 1 {
                        v[i] ^= v[i - k];
                    }
                }
            }
            directions.push(v);
        }
        let mut rsg = Self {
            count: 0,
            state: vec![0; dimension],
            directions,
            point: vec![0.0; dimension],
        };
        for _ in 0..skip {
            rsg.advance();
        }
        Ok(rsg)
    }

    /// Dimension of the points.
    pub fn dimension(&self) -> usize {
        self.state.len()
    }

    fn advance(&mut self) {
        // Gray code: flip the direction number of the lowest zero bit
        let c = self.count.trailing_ones() as usize;
        for (s, v) in self.state.iter_mut().zip(self.directions.iter()) {
            *s ^= v[c];
        }
        self.count += 1;
    }

    /// Next point; the all-zero origin is never returned.
    pub fn next_sequence(&mut self) -> &[Real] {
        self.advance();
        for (p, &s) in self.point.iter_mut().zip(self.state.iter()) {
            *p = s as Real / NORMALIZER;
        }
        &self.point
    }
}
