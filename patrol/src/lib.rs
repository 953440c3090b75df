#![feature(assert_matches)]

mod bridge;
mod database;
mod ecs;
mod estimator;
mod geometry;
mod models;
mod operation;
mod run;
mod runner;
mod selection;

#[cfg(feature = "opencv")]
pub use estimator::TemplateMatchEstimator;
pub use {
    bridge::{
        Actuator, AutoBattle, BattleResult, Frame, FrameSource, Image, LargeMap, LargeMapStore,
        MinimapCrop, MinimapCutter, MoveDirection, Transport,
    },
    database::{Database, DatabaseEvent, Identifiable},
    ecs::RouteEvent,
    estimator::{PositionEstimator, search_window},
    geometry::{Point, Rect, angle_delta, bearing},
    models::*,
    operation::Operation,
    run::{Collaborators, RouteRun},
    runner::{Navigation, RouteFailure, UnstuckPattern},
    selection::{
        Candidate, Choice, ChoiceSession, Level, Marker, NO_DETAIL_CATEGORY, OcrText, PriorityRule,
        PrioritySelector, annotate_markers, build_candidates, find_by_lcs, is_category_match,
        lcs_length, normalize_category, parse_rules, remove_overlapping, select_by_priority,
    },
    strum::{IntoEnumIterator, ParseError},
};
