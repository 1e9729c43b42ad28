use proptest::prelude::*;
use sdk::errors::{EngineError, ErrorExt};
use sdk::{ConversationTurn, Question, Route};

proptest! {
    #[test]
    fn test_error_user_hint_never_echoes_details(detail in "[a-z]{12,24}") {
        let errs = vec![
            EngineError::Config(detail.clone()),
            EngineError::MissingCredential(detail.clone()),
            EngineError::Database(detail.clone()),
            EngineError::Network(detail.clone()),
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&detail));
        }
    }

    #[test]
    fn test_route_parse_ignores_case_and_padding(index in 0usize..5, pad in " {0,3}", lower in any::<bool>()) {
        let route = Route::ALL[index];
        let name = if lower {
            route.as_str().to_lowercase()
        } else {
            route.as_str().to_string()
        };
        let parsed: Route = format!("{pad}{name}{pad}").parse().unwrap();
        prop_assert_eq!(parsed, route);
    }

    #[test]
    fn test_last_user_turn_skips_assistant_turns(
        turns in prop::collection::vec((any::<bool>(), "[a-z ]{1,20}"), 0..8)
    ) {
        let history: Vec<ConversationTurn> = turns
            .iter()
            .map(|(from_user, text)| {
                if *from_user {
                    ConversationTurn::user(text.clone())
                } else {
                    ConversationTurn::assistant(text.clone())
                }
            })
            .collect();
        let expected = turns
            .iter()
            .rev()
            .find(|(from_user, _)| *from_user)
            .map(|(_, text)| text.as_str());

        let question = Question::new("and then?").with_history(history);
        prop_assert_eq!(question.last_user_turn(), expected);
    }
}
