/* division by 2^n, rounding half away from zero */
#[inline]
pub(crate) fn div_pow2_re(x: i32, n: u32) -> i32 {
    if n == 0 {
        x
    } else {
        (x + (1 << (n - 1)) - (x < 0) as i32) >> n
    }
}

/* division by 2^n with an explicit rounding offset */
#[inline]
pub(crate) fn div_round_pow2(x: i64, n: u32, r: i64) -> i64 {
    (x + r - (x < 0) as i64) >> n
}

/* halving, truncated toward zero */
#[inline]
pub(crate) fn div2(x: i32) -> i32 {
    x / 2
}

#[inline]
pub(crate) fn sort2<T: PartialOrd>(v: &mut [T], i: usize, j: usize) {
    if v[i] > v[j] {
        v.swap(i, j);
    }
}

#[inline]
pub(crate) fn signum(x: i64) -> i32 {
    (x > 0) as i32 - (x < 0) as i32
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn div_pow2_re_rounds_away_from_zero() {
        assert_eq!(div_pow2_re(3, 1), 2);
        assert_eq!(div_pow2_re(-3, 1), -2);
        assert_eq!(div_pow2_re(-1, 1), -1);
        assert_eq!(div_pow2_re(-2, 1), -1);
        assert_eq!(div_pow2_re(5, 2), 1);
        assert_eq!(div_pow2_re(6, 2), 2);
        assert_eq!(div_pow2_re(-6, 2), -2);
        assert_eq!(div_pow2_re(-7, 0), -7);
    }

    #[test]
    fn div_round_pow2_half() {
        assert_eq!(div_round_pow2(0x8000, 16, 0x8000), 1);
        assert_eq!(div_round_pow2(-0x8000, 16, 0x8000), -1);
        assert_eq!(div_round_pow2(0x7fff, 16, 0x8000), 0);
        assert_eq!(div_round_pow2(3 * 0x10000, 16, 0x8000), 3);
    }

    #[test]
    fn sort2_orders_pair() {
        let mut v = [4, 1, 3];
        sort2(&mut v, 0, 1);
        assert_eq!(v, [1, 4, 3]);
        sort2(&mut v, 0, 2);
        assert_eq!(v, [1, 4, 3]);
    }
}
