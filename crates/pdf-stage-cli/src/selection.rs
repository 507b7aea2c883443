use pdf_stage::Rotation;
use std::str::FromStr;

/// Highest position accepted on the command line
pub const MAX_POSITION: usize = 100_000;

/// 1-based staging positions, written as `1,3-5,8`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageList(pub Vec<usize>);

impl FromStr for PageList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut positions = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((start, end)) => {
                    let start = parse_position(start)?;
                    let end = parse_position(end)?;
                    if end < start {
                        return Err(format!("Descending range: {}", part));
                    }
                    positions.extend(start..=end);
                }
                None => positions.push(parse_position(part)?),
            }
        }
        if positions.is_empty() {
            return Err("Empty page list".to_string());
        }
        Ok(PageList(positions))
    }
}

fn parse_position(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("Page positions start at 1".to_string()),
        Ok(n) if n > MAX_POSITION => Err(format!(
            "Page position {} is above the limit of {}",
            n, MAX_POSITION
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("Not a page position: {:?}", s)),
    }
}

/// `POSITION:DEGREES`, e.g. `2:90`
pub fn parse_rotation(s: &str) -> Result<(usize, Rotation), String> {
    let (position, degrees) = s
        .split_once(':')
        .ok_or_else(|| format!("Expected POSITION:DEGREES, got {:?}", s))?;
    let position = parse_position(position)?;
    let rotation = degrees
        .trim()
        .parse::<u16>()
        .ok()
        .and_then(Rotation::from_degrees)
        .ok_or_else(|| format!("Rotation must be 0, 90, 180 or 270, got {:?}", degrees))?;
    Ok((position, rotation))
}
