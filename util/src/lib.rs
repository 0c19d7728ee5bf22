/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = $x - $y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

pub fn prefix_sum(counts: impl IntoIterator<Item = usize>, x0: usize) -> impl Iterator<Item = usize> {
    counts.into_iter().scan(x0, |sum, x| {
        let current = *sum;
        *sum += x;
        Some(current)
    })
}

/// Asserts that `offsets` splits `[0, total)` into consecutive half-open ranges.
pub fn assert_contiguous_partition(offsets: &[usize], total: usize) {
    assert!(!offsets.is_empty(), "Offset table must not be empty.");
    assert_eq!(offsets[0], 0, "Offset table must start at zero: {:?}", offsets);
    for window in offsets.windows(2) {
        assert!(window[0] <= window[1], "Offset table must be non-decreasing: {:?}", offsets);
    }
    assert_eq!(
        offsets[offsets.len() - 1],
        total,
        "Offset table must end at the total count: {:?}",
        offsets
    );
}
