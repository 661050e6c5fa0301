// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

/// A first-order ODE system over a fixed-size state vector.
///
/// Anything that can evaluate the instantaneous rate of change of an
/// `N`-component state can be stepped by [`rk4_step`]; closures of the form
/// `Fn(&[f64; N]) -> [f64; N]` qualify directly.
pub trait OdeSystem<const N: usize> {
    /// Evaluate dy/dλ at `state`.
    fn derivative(&self, state: &[f64; N]) -> [f64; N];
}

impl<const N: usize, F> OdeSystem<N> for F
where
    F: Fn(&[f64; N]) -> [f64; N],
{
    fn derivative(&self, state: &[f64; N]) -> [f64; N] {
        self(state)
    }
}

fn offset<const N: usize>(state: &[f64; N], k: &[f64; N], scale: f64) -> [f64; N] {
    let mut out = *state;
    for (o, ki) in out.iter_mut().zip(k.iter()) {
        *o += scale * ki;
    }
    out
}

/// Advance `state` by one classical 4th-order Runge-Kutta step of size `h`.
///
/// Returns a new state; the input is left untouched and no scratch is
/// shared between calls.
pub fn rk4_step<const N: usize, S>(system: &S, state: &[f64; N], h: f64) -> [f64; N]
where
    S: OdeSystem<N> + ?Sized,
{
    let k1 = system.derivative(state);
    let k2 = system.derivative(&offset(state, &k1, 0.5 * h));
    let k3 = system.derivative(&offset(state, &k2, 0.5 * h));
    let k4 = system.derivative(&offset(state, &k3, h));

    let mut next = *state;
    let sixth = h / 6.0;
    for i in 0..N {
        next[i] += sixth * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    next
}

/// Apply `steps` fixed RK4 steps of size `h` starting from `state`.
pub fn integrate_fixed<const N: usize, S>(
    system: &S,
    state: &[f64; N],
    h: f64,
    steps: usize,
) -> [f64; N]
where
    S: OdeSystem<N> + ?Sized,
{
    let mut current = *state;
    for _ in 0..steps {
        current = rk4_step(system, &current, h);
    }
    current
}
