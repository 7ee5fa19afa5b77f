//! Text forms of points and paths, as typed on the command line.
//!
//! A point is `x,y`. A path is waypoints separated by `;` or whitespace,
//! where a waypoint is a point or a bare actuator id, so
//! `"0,0; 60,0; 120,0"`, `"0,0 60,0 120,0"` and `"0,0 60,0 2"` can all be
//! the same path.

use nom::{
    branch::alt,
    character::complete::{char, digit1, multispace0, multispace1, space0},
    combinator::{all_consuming, map, map_res, value},
    error::Error,
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, separated_pair},
    Finish, IResult,
};

use std::str::FromStr;

use crate::layout::{ActuatorId, Point};
use crate::schedule::Waypoint;

fn parse_point(s: &str) -> IResult<&str, Point> {
    map(
        separated_pair(double, delimited(space0, char(','), space0), double),
        |(x, y)| Point::new(x, y),
    )(s)
}

fn parse_actuator_id(s: &str) -> IResult<&str, ActuatorId> {
    map_res(digit1, str::parse::<ActuatorId>)(s)
}

fn parse_waypoint(s: &str) -> IResult<&str, Waypoint> {
    alt((
        map(parse_point, Waypoint::Point),
        map(parse_actuator_id, Waypoint::Actuator),
    ))(s)
}

fn parse_separator(s: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(multispace0, char(';'), multispace0)),
        value((), multispace1),
    ))(s)
}

fn parse_polyline(s: &str) -> IResult<&str, Vec<Waypoint>> {
    delimited(
        multispace0,
        separated_list1(parse_separator, parse_waypoint),
        multispace0,
    )(s)
}

fn owned(e: Error<&str>) -> Error<String> {
    Error {
        input: e.input.to_string(),
        code: e.code,
    }
}

impl FromStr for Point {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(delimited(multispace0, parse_point, multispace0))(s)
            .finish()
            .map(|(_remaining, point)| point)
            .map_err(owned)
    }
}

/// A path typed as text.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline(pub Vec<Waypoint>);

impl FromStr for Polyline {
    type Err = Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(parse_polyline)(s)
            .finish()
            .map(|(_remaining, waypoints)| Polyline(waypoints))
            .map_err(owned)
    }
}
