use biomatrix_core::view::{
    content_digest, convert_value, hashable, merge_cols, merge_rows, permute_values, rename_cols, select,
    select_cols, select_rows, transpose, TransposeView, ValueConverter,
};
use biomatrix_core::{to_dense, DenseMatrix, KeyIndex, Matrix, MatrixRef, ViewKind};
use proptest::prelude::*;
use std::sync::Arc;

fn keys(prefix: &str, n: usize) -> KeyIndex {
    KeyIndex::new((0..n).map(|i| format!("{}{}", prefix, i))).unwrap()
}

/// Small matrices of 0..4 with 0 as the missing value
fn arb_matrix() -> impl Strategy<Value = MatrixRef<i32>> {
    (1usize..5, 1usize..5)
        .prop_flat_map(|(rows, cols)| (Just(rows), Just(cols), prop::collection::vec(0i32..4, rows * cols)))
        .prop_map(|(rows, cols, values)| {
            let m = DenseMatrix::from_parts(keys("r", rows), keys("c", cols), 0, values).unwrap();
            Arc::new(m) as MatrixRef<i32>
        })
}

fn arb_matrix_with_perms() -> impl Strategy<Value = (MatrixRef<i32>, Vec<usize>, Vec<usize>)> {
    arb_matrix().prop_flat_map(|m| {
        let identity: Vec<usize> = (0..m.col_count()).collect();
        (Just(m), Just(identity.clone()).prop_shuffle(), Just(identity).prop_shuffle())
    })
}

fn negate(v: &i32) -> i32 {
    -v
}

fn widen(v: &i32) -> i64 {
    i64::from(*v)
}

fn narrow(v: &i64) -> i32 {
    *v as i32
}

/// A matrix behind one layer of each view kind, or none
fn layered(m: MatrixRef<i32>, layer: u8) -> MatrixRef<i32> {
    let rows: Vec<String> = m.row_keys().keys().iter().rev().cloned().collect();
    let reversed: Vec<usize> = (0..m.col_count()).rev().collect();
    match layer {
        0 => m,
        1 => transpose(m),
        2 => select_rows(m, rows).unwrap(),
        3 => permute_values(m, reversed).unwrap(),
        4 => {
            let renames: Vec<(String, String)> = m.col_keys().iter().map(|k| (k.to_string(), format!("n{}", k))).collect();
            rename_cols(m, renames).unwrap()
        }
        5 => convert_value(m, ValueConverter::new(negate, negate), 0),
        6 => hashable(m),
        _ => {
            let renames: Vec<(String, String)> = m.col_keys().iter().map(|k| (k.to_string(), format!("d{}", k))).collect();
            let shifted = rename_cols(m.clone(), renames).unwrap();
            merge_cols(true, vec![m, shifted]).unwrap()
        }
    }
}

fn arb_view() -> impl Strategy<Value = MatrixRef<i32>> {
    (arb_matrix(), 0u8..8).prop_map(|(m, layer)| layered(m, layer))
}

proptest! {
    #[test]
    fn prop_no_op_factories_return_their_input(v in arb_view()) {
        let rows = v.row_keys().keys().to_vec();
        let cols = v.col_keys().keys().to_vec();
        prop_assert!(Arc::ptr_eq(&select(v.clone(), rows.clone(), cols.clone()).unwrap(), &v));
        prop_assert!(Arc::ptr_eq(&select_rows(v.clone(), rows).unwrap(), &v));
        prop_assert!(Arc::ptr_eq(&select_cols(v.clone(), cols.clone()).unwrap(), &v));

        let same: Vec<(String, String)> = cols.iter().map(|k| (k.clone(), k.clone())).collect();
        prop_assert!(Arc::ptr_eq(&rename_cols(v.clone(), same).unwrap(), &v));
        prop_assert!(Arc::ptr_eq(&rename_cols(v.clone(), Vec::<(&str, &str)>::new()).unwrap(), &v));

        let identity: Vec<usize> = (0..v.col_count()).collect();
        prop_assert!(Arc::ptr_eq(&permute_values(v.clone(), identity).unwrap(), &v));
        prop_assert!(Arc::ptr_eq(&merge_rows(true, vec![v.clone()]).unwrap(), &v));
        prop_assert!(Arc::ptr_eq(&merge_cols(true, vec![v.clone()]).unwrap(), &v));

        let h = hashable(v.clone());
        prop_assert!(Arc::ptr_eq(&hashable(h.clone()), &h));
    }

    #[test]
    fn prop_inverse_factories_return_the_original(v in arb_view()) {
        let twice = transpose(transpose(v.clone()));
        if v.kind() == ViewKind::Transpose {
            let inner = v.as_any().downcast_ref::<TransposeView<i32>>().unwrap();
            prop_assert!(Arc::ptr_eq(&transpose(v.clone()), inner.parent()));
        } else {
            prop_assert!(Arc::ptr_eq(&twice, &v));
        }
        prop_assert!(twice.matrix_equals(v.as_ref()).unwrap());

        let converter = ValueConverter::new(widen, narrow);
        let wide = convert_value(v.clone(), converter, 0i64);
        prop_assert!(Arc::ptr_eq(&convert_value(wide, converter.inverse(), 0), &v));

        let once = select(v.clone(), v.row_keys().keys().iter().rev().cloned(), v.col_keys().keys().to_vec()).unwrap();
        let again = select(once.clone(), once.row_keys().keys().to_vec(), once.col_keys().keys().to_vec()).unwrap();
        prop_assert!(Arc::ptr_eq(&again, &once));
    }

    #[test]
    fn prop_layered_views_read_like_a_copy(v in arb_view()) {
        let copy = to_dense(v.as_ref()).unwrap();
        prop_assert!(copy.matrix_equals(v.as_ref()).unwrap());
    }

    #[test]
    fn prop_equality_is_reflexive_and_symmetric(m in arb_matrix(), n in arb_matrix()) {
        prop_assert!(m.matrix_equals(m.as_ref()).unwrap());
        prop_assert_eq!(m.matrix_equals(n.as_ref()).unwrap(), n.matrix_equals(m.as_ref()).unwrap());
    }

    #[test]
    fn prop_transpose_swaps_cells(m in arb_matrix()) {
        let t = transpose(m.clone());
        prop_assert!(Arc::ptr_eq(&transpose(t.clone()), &m));
        for (r, row_key) in m.row_keys().iter().enumerate() {
            for (c, col_key) in m.col_keys().iter().enumerate() {
                prop_assert_eq!(t.try_get(col_key, row_key).unwrap(), m.try_get_at(r, c).unwrap());
            }
        }
        let copy = to_dense(t.as_ref()).unwrap();
        prop_assert!(copy.matrix_equals(t.as_ref()).unwrap());
    }

    #[test]
    fn prop_permutations_compose((m, p, q) in arb_matrix_with_perms()) {
        let once = permute_values(m.clone(), p.clone()).unwrap();
        let twice = permute_values(once, q.clone()).unwrap();
        for r in 0..m.row_count() {
            for c in 0..m.col_count() {
                prop_assert_eq!(twice.try_get_at(r, c).unwrap(), m.try_get_at(r, p[q[c]]).unwrap());
            }
        }
    }

    #[test]
    fn prop_digest_follows_content(m in arb_matrix()) {
        let copy = to_dense(m.as_ref()).unwrap();
        prop_assert_eq!(content_digest(m.as_ref()).unwrap(), content_digest(&copy).unwrap());

        let rows: Vec<String> = m.row_keys().keys().iter().rev().cloned().collect();
        let cols = m.col_keys().keys().to_vec();
        let reordered = select(m.clone(), rows, cols).unwrap();
        prop_assert!(reordered.matrix_equals(m.as_ref()).unwrap() == (m.row_count() == 1));
    }
}
