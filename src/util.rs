/// Arithmetic mean, `None` for an empty slice
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation, `None` for an empty slice
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (v - m).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

/// Mean of integer scores rounded half away from zero
pub fn rounded_mean<I>(values: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    let data: Vec<f64> = values.into_iter().map(f64::from).collect();
    mean(&data).map(|m| m.round() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10., 20., 30., 15., 22.]), Some(19.4));
        assert_eq!(mean(&[42.0]), Some(42.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
        let sd = std_dev(&[100., 120., 90., 102., 94.]).unwrap();
        assert!((sd - 10.322790320451151).abs() < 1e-9);
    }

    #[test]
    fn test_rounded_mean() {
        assert_eq!(rounded_mean([40, 45]), Some(43));
        assert_eq!(rounded_mean([40, 41, 41]), Some(41));
        assert_eq!(rounded_mean(Vec::<u32>::new()), None);
    }
}
