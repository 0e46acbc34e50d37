/// Calculate Simple Moving Average (SMA) over the most recent `period` values
///
/// `newest_first` yields values from the latest backwards, which is how both a
/// slice reversed and a ring iterated in reverse hand them out.
pub fn calculate_sma<I>(newest_first: I, period: usize) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    if period == 0 {
        return None;
    }

    let mut count = 0usize;
    let mut sum = 0.0;
    for value in newest_first.into_iter().take(period) {
        sum += value;
        count += 1;
    }

    if count < period {
        return None;
    }
    Some(sum / period as f64)
}
