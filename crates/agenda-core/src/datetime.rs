use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Days,
  Months,
  NaiveDate,
  Weekday
};
use regex::Regex;

use crate::task::Frequency;

/// Adds whole calendar months, clamping the day to the last valid
/// day of the target month (Jan 31 + 1 month is Feb 28/29).
#[must_use]
pub fn add_months_clamped(
  date: NaiveDate,
  months: u32
) -> Option<NaiveDate> {
  date.checked_add_months(Months::new(
    months
  ))
}

/// Adds whole calendar years; Feb 29 lands on Feb 28 in a
/// non-leap target year.
#[must_use]
pub fn add_years_clamped(
  date: NaiveDate,
  years: u32
) -> Option<NaiveDate> {
  let months = years.checked_mul(12)?;
  add_months_clamped(date, months)
}

/// One step of a series: `interval` units of `frequency`.
///
/// Returns `None` only when the result leaves chrono's
/// representable range.
#[must_use]
pub fn step(
  date: NaiveDate,
  frequency: Frequency,
  interval: u32
) -> Option<NaiveDate> {
  match frequency {
    | Frequency::Daily => {
      date.checked_add_days(Days::new(
        u64::from(interval)
      ))
    }
    | Frequency::Weekly => {
      date.checked_add_days(Days::new(
        u64::from(interval) * 7
      ))
    }
    | Frequency::Monthly => {
      add_months_clamped(date, interval)
    }
    | Frequency::Yearly => {
      add_years_clamped(date, interval)
    }
  }
}

fn relative_re() -> Option<&'static Regex>
{
  static RELATIVE: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  RELATIVE
    .get_or_init(|| {
      Regex::new(
        r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwmy])$"
      )
      .ok()
    })
    .as_ref()
}

/// Parses a calendar-date expression relative to `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower = token.to_lowercase();

  match lower.as_str() {
    | "today" | "hoje" => {
      return Ok(today);
    }
    | "tomorrow" | "amanha"
    | "amanhã" => {
      return today
        .checked_add_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             tomorrow"
          )
        });
    }
    | "yesterday" | "ontem" => {
      return today
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| {
          anyhow!(
            "failed to step back to \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(target) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today, target
    ));
  }

  let rel_re =
    relative_re().ok_or_else(|| {
      anyhow!(
        "internal regex compile \
         failure"
      )
    })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let sign = caps
      .name("sign")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative sign")
      })?;
    let num: u32 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let unit = caps
      .name("unit")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!("missing relative unit")
      })?;

    let shifted = match (sign, unit) {
      | ("+", "d") => {
        today.checked_add_days(
          Days::new(u64::from(num))
        )
      }
      | ("-", "d") => {
        today.checked_sub_days(
          Days::new(u64::from(num))
        )
      }
      | ("+", "w") => {
        today.checked_add_days(
          Days::new(u64::from(num) * 7)
        )
      }
      | ("-", "w") => {
        today.checked_sub_days(
          Days::new(u64::from(num) * 7)
        )
      }
      | ("+", "m") => {
        add_months_clamped(today, num)
      }
      | ("-", "m") => {
        today.checked_sub_months(
          Months::new(num)
        )
      }
      | ("+", "y") => {
        add_years_clamped(today, num)
      }
      | ("-", "y") => {
        num.checked_mul(12).and_then(
          |months| {
            today.checked_sub_months(
              Months::new(months)
            )
          }
        )
      }
      | _ => {
        return Err(anyhow!(
          "unknown relative unit: \
           {unit}"
        ));
      }
    };

    return shifted.ok_or_else(|| {
      anyhow!(
        "relative date out of range: \
         {input}"
      )
    });
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%d/%m/%Y"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday (or \
     hoje/amanha/ontem), weekday \
     names (e.g. monday), \
     +Nd/+Nw/+Nm/+Ny, YYYY-MM-DD, \
     DD/MM/YYYY"
  })
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday();
  let target_idx =
    target.num_days_from_monday();
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_days(Days::new(
      u64::from(delta)
    ))
    .unwrap_or(from)
}

/// Date-only serde: writes `YYYY-MM-DD`, reads that or the date part
/// of a legacy timestamp string.
pub mod calendar_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const FORMAT: &str = "%Y-%m-%d";

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &date.format(FORMAT).to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    parse_stored(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub(crate) fn parse_stored(
    raw: &str
  ) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = trimmed
      .get(..10)
      .unwrap_or(trimmed);
    NaiveDate::parse_from_str(
      date_part, FORMAT
    )
    .map_err(|err| {
      format!(
        "invalid calendar date \
         '{trimmed}': {err}"
      )
    })
  }

  pub mod option {
    use chrono::NaiveDate;
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      date: &Option<NaiveDate>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match date {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<NaiveDate>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if !raw.trim().is_empty() =>
        {
          super::parse_stored(&raw)
            .map(Some)
            .map_err(
              serde::de::Error::custom
            )
        }
        | _ => Ok(None)
      }
    }
  }
}
