use lilou_cli::{
    contracts::{Deployment, GenesisToken, COIN_HOLDER, DEPLOYER, GENESIS_NFT, NFT_HOLDER},
    ledger::{Answer, Call, ChainState, HostError, LedgerEvent, Operation, Outcome, Query},
    simulate::Simulator,
};
use lilou_core::{Address, FungibleEvent, RegistryEvent, TokenId};

const A: Address = Address::repeat_byte(0xa1);
const B: Address = Address::repeat_byte(0xb2);
const C: Address = Address::repeat_byte(0xc3);

fn bare_deployment() -> Deployment {
    Deployment {
        minters: vec![DEPLOYER],
        allocations: Vec::new(),
        nfts: vec![GenesisToken {
            owner: A,
            token_id: TokenId(1),
        }],
        ..Deployment::default()
    }
}

fn call(caller: Address, op: Operation) -> Call {
    Call { caller, op }
}

fn events(outcome: &Outcome) -> &[LedgerEvent] {
    match outcome {
        Outcome::Accepted { events } => events,
        Outcome::Rejected { reason } => panic!("call rejected: {reason}"),
    }
}

#[test]
fn coin_allowance_flow() {
    let mut state = ChainState::from_deployment(bare_deployment()).unwrap();

    let mint = state.execute(&call(DEPLOYER, Operation::Mint { to: A, amount: 100 }));
    assert_eq!(
        events(&mint.outcome),
        [LedgerEvent::Coin(FungibleEvent::Transfer {
            from: Address::NULL,
            to: A,
            amount: 100,
        })]
    );
    assert_eq!(state.coin().total_supply(), 100);

    let approve = state.execute(&call(
        A,
        Operation::Approve {
            spender: B,
            amount: 40,
        },
    ));
    assert_eq!(
        events(&approve.outcome),
        [LedgerEvent::Coin(FungibleEvent::Approval {
            owner: A,
            spender: B,
            amount: 40,
        })]
    );

    let spend = state.execute(&call(
        B,
        Operation::TransferFrom {
            from: A,
            to: C,
            amount: 40,
        },
    ));
    assert!(spend.is_accepted());
    assert_eq!(state.coin().balance_of(&A), 60);
    assert_eq!(state.coin().balance_of(&C), 40);
    assert_eq!(state.coin().allowance(&A, &B), 0);

    let root = state.state_root();
    let overspend = state.execute(&call(
        B,
        Operation::TransferFrom {
            from: A,
            to: C,
            amount: 1,
        },
    ));
    match overspend.outcome {
        Outcome::Rejected { reason } => assert!(reason.contains("may spend 0"), "{reason}"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(state.state_root(), root);
    state.check_invariants().unwrap();
}

#[test]
fn nft_single_use_approval() {
    let mut state = ChainState::from_deployment(bare_deployment()).unwrap();

    assert!(state
        .execute(&call(
            A,
            Operation::NftApprove {
                spender: B,
                token_id: TokenId(1),
            },
        ))
        .is_accepted());

    let moved = state.execute(&call(
        B,
        Operation::NftTransferFrom {
            from: A,
            to: C,
            token_id: TokenId(1),
        },
    ));
    assert_eq!(
        events(&moved.outcome),
        [LedgerEvent::Collection(RegistryEvent::Transfer {
            from: A,
            to: C,
            token_id: TokenId(1),
        })]
    );
    assert_eq!(
        state
            .query(&Query::GetApproved {
                token_id: TokenId(1)
            })
            .unwrap(),
        Answer::Address(Address::NULL)
    );

    let back = state.execute(&call(
        B,
        Operation::NftTransferFrom {
            from: C,
            to: A,
            token_id: TokenId(1),
        },
    ));
    assert!(!back.is_accepted());
    assert_eq!(state.collection().owner_of(&TokenId(1)).unwrap(), C);
}

#[test]
fn default_deployment_reproduces_genesis() {
    let state = ChainState::from_deployment(Deployment::default()).unwrap();
    assert_eq!(state.coin().name(), "Lilou Coin");
    assert_eq!(state.coin().total_supply(), 42_000_000_00);
    assert_eq!(
        state
            .query(&Query::BalanceOf {
                account: COIN_HOLDER
            })
            .unwrap(),
        Answer::Amount(21_000_000_00)
    );
    assert_eq!(state.collection().owner_of(&GENESIS_NFT).unwrap(), NFT_HOLDER);
    assert_eq!(
        state.query(&Query::CollectionSymbol).unwrap(),
        Answer::Text("LLF".to_string())
    );
}

#[test]
fn non_minter_cannot_mint() {
    let mut state = ChainState::from_deployment(Deployment::default()).unwrap();
    let err = state
        .dispatch(&call(
            COIN_HOLDER,
            Operation::Mint {
                to: COIN_HOLDER,
                amount: 1,
            },
        ))
        .unwrap_err();
    assert!(matches!(err, HostError::NotMinter { caller } if caller == COIN_HOLDER));
    assert_eq!(state.coin().total_supply(), 42_000_000_00);
}

#[test]
fn equal_scripts_give_equal_roots() {
    let script: Vec<Call> = [
        r#"{"caller":"0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1","op":"nft_approve","spender":"0xb2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2","token_id":1}"#,
        r#"{"caller":"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266","op":"mint","to":"0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1","amount":500}"#,
        r#"{"caller":"0xa1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1","op":"transfer","to":"0xc3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3","amount":125}"#,
    ]
    .iter()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();

    let run = || {
        let mut state = ChainState::from_deployment(bare_deployment()).unwrap();
        let receipts = state.execute_all(&script);
        assert!(receipts.iter().all(|r| r.is_accepted()));
        (state.height(), state.snapshot())
    };
    let (height, first) = run();
    let (_, second) = run();
    assert_eq!(height, 3);
    assert_eq!(first.state_root, second.state_root);
    assert_eq!(first.coin.balances.get(&C), Some(&125));

    let untouched = ChainState::from_deployment(bare_deployment()).unwrap();
    assert_ne!(untouched.state_root(), first.state_root);
}

#[test]
fn simulation_holds_invariants() {
    for seed in [1, 42, 424242] {
        let mut state = ChainState::from_deployment(Deployment::default()).unwrap();
        let mut simulator = Simulator::new(seed, &state);
        let report = simulator.run(&mut state, 300).unwrap();
        assert_eq!(report.state_root, state.state_root());
        assert_eq!(state.height(), 300);
    }
}
